use std::fs::File;

use anyhow::Result;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use tempfile::tempdir;
use time::{Date, Month, OffsetDateTime, Time, UtcOffset};

use iot_archiver::etl::{archive_schema, read_archive, write_archive, CREATED_BY};
use iot_archiver::Record;

fn record(id: i64, timestamp: OffsetDateTime, device_id: &str, value: f64, table: &str) -> Record {
    Record {
        id,
        timestamp,
        device_id: device_id.to_string(),
        value,
        table_name: table.to_string(),
    }
}

fn sample() -> Result<Vec<Record>> {
    let date = Date::from_calendar_date(2026, Month::June, 15)?;
    let precise = date.with_time(Time::from_hms_nano(8, 30, 0, 123_456_789)?).assume_utc();
    let pre_epoch = Date::from_calendar_date(1969, Month::December, 31)?
        .with_time(Time::from_hms_nano(23, 59, 59, 1)?)
        .assume_utc();
    let offset = date
        .with_time(Time::from_hms(1, 0, 0)?)
        .assume_offset(UtcOffset::from_hms(-5, 0, 0)?);

    Ok(vec![
        record(i64::MAX, precise, "sensor-α", -0.0, "a"),
        record(-7, pre_epoch, "", f64::MIN_POSITIVE / 2.0, "a"),
        record(0, offset, "dev/42", f64::MAX, "telemetry.readings"),
        record(3, OffsetDateTime::UNIX_EPOCH, "dev 3", f64::NAN, "b"),
    ])
}

#[test]
fn round_trip_preserves_every_field() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("archive.parquet");
    let records = sample()?;

    write_archive(&records, &path)?;
    let decoded = read_archive(&path)?;

    assert_eq!(decoded.len(), records.len());
    for (expected, actual) in records.iter().zip(&decoded) {
        assert_eq!(actual.id, expected.id);
        assert_eq!(actual.timestamp, expected.timestamp);
        assert_eq!(
            actual.timestamp.unix_timestamp_nanos(),
            expected.timestamp.unix_timestamp_nanos()
        );
        assert_eq!(actual.device_id, expected.device_id);
        assert_eq!(actual.value.to_bits(), expected.value.to_bits());
        assert_eq!(actual.table_name, expected.table_name);
    }
    Ok(())
}

#[test]
fn file_uses_fixed_schema_and_snappy() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("archive.parquet");
    let records: Vec<Record> = (0..120)
        .map(|i| {
            record(
                i,
                OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(i),
                "dev",
                i as f64,
                "iot_data",
            )
        })
        .collect();
    write_archive(&records, &path)?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?;
    assert_eq!(builder.schema().fields(), archive_schema().fields());

    let metadata = builder.metadata();
    assert_eq!(metadata.file_metadata().num_rows(), 120);
    for row_group in metadata.row_groups() {
        for column in row_group.columns() {
            assert_eq!(column.compression(), Compression::SNAPPY);
        }
    }
    let created_by = metadata
        .file_metadata()
        .key_value_metadata()
        .and_then(|kv| kv.iter().find(|entry| entry.key == "created_by"))
        .and_then(|entry| entry.value.clone());
    assert_eq!(created_by.as_deref(), Some(CREATED_BY));

    let ids: Vec<i64> = read_archive(&path)?.into_iter().map(|r| r.id).collect();
    assert_eq!(ids, (0..120).collect::<Vec<_>>(), "rows keep batch order");
    Ok(())
}

#[test]
fn out_of_range_timestamp_fails_encoding() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("archive.parquet");
    let far_future = Date::from_calendar_date(2300, Month::January, 1)?.midnight().assume_utc();

    let err = write_archive(&[record(1, far_future, "dev", 1.0, "a")], &path).unwrap_err();
    assert!(format!("{err:#}").contains("does not fit"));
    Ok(())
}
