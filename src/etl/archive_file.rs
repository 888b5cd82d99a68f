use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use time::OffsetDateTime;

use super::sink::{BatchSink, ParquetSink};
use crate::record::Record;

/// Rows per arrow batch handed to the writer; progress is logged at this pace.
pub const WRITE_CHUNK_ROWS: usize = 50;
pub const CREATED_BY: &str = "iot-archiver";

pub const COL_ID: &str = "id";
pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_DEVICE_ID: &str = "device_id";
pub const COL_VALUE: &str = "value";
pub const COL_TABLE_NAME: &str = "table_name";

/// Fixed archive schema. `timestamp` holds nanoseconds since the Unix epoch.
pub fn archive_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(COL_ID, DataType::Int64, false),
        Field::new(COL_TIMESTAMP, DataType::Int64, false),
        Field::new(COL_DEVICE_ID, DataType::Utf8, false),
        Field::new(COL_VALUE, DataType::Float64, false),
        Field::new(COL_TABLE_NAME, DataType::Utf8, false),
    ]))
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue::new("created_by".to_string(), CREATED_BY.to_string());
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Writes `records` to `path` in the order given.
///
/// The file is closed before this returns. On error the partial file is left
/// where it is; it has no footer and must not be uploaded.
pub fn write_archive(records: &[Record], path: &Path) -> Result<()> {
    info!(
        "Starting to write {} records to parquet file: {}",
        records.len(),
        path.display()
    );

    let schema = archive_schema();
    let mut sink = ParquetSink::create(path, Arc::clone(&schema), Some(writer_properties()))
        .context("creating parquet writer")?;

    for chunk in records.chunks(WRITE_CHUNK_ROWS) {
        let offset = sink.rows_written();
        let batch = records_to_batch(&schema, chunk)
            .with_context(|| format!("encoding records {offset}..{}", offset + chunk.len()))?;
        sink.write_batch(batch).with_context(|| format!("writing record {offset}"))?;

        let written = sink.rows_written();
        if written < records.len() {
            info!("Wrote {written} records");
        }
    }

    sink.finish().context("stopping writer")
}

fn records_to_batch(schema: &SchemaRef, records: &[Record]) -> Result<RecordBatch> {
    let timestamps = records
        .iter()
        .map(|record| timestamp_nanos(record.timestamp))
        .collect::<Result<Vec<_>>>()?;

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(records.iter().map(|r| r.id))),
        Arc::new(Int64Array::from(timestamps)),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.device_id.as_str()),
        )),
        Arc::new(Float64Array::from_iter_values(records.iter().map(|r| r.value))),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.table_name.as_str()),
        )),
    ];
    Ok(RecordBatch::try_new(Arc::clone(schema), columns)?)
}

fn timestamp_nanos(ts: OffsetDateTime) -> Result<i64> {
    i64::try_from(ts.unix_timestamp_nanos())
        .map_err(|_| anyhow!("timestamp {ts} does not fit in i64 nanoseconds"))
}

/// Reads an archive written by [`write_archive`] back into records.
pub fn read_archive(path: &Path) -> Result<Vec<Record>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch?;
        let ids = column::<Int64Array>(&batch, COL_ID)?;
        let timestamps = column::<Int64Array>(&batch, COL_TIMESTAMP)?;
        let device_ids = column::<StringArray>(&batch, COL_DEVICE_ID)?;
        let values = column::<Float64Array>(&batch, COL_VALUE)?;
        let tables = column::<StringArray>(&batch, COL_TABLE_NAME)?;

        for row in 0..batch.num_rows() {
            let nanos = timestamps.value(row);
            let timestamp = OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
                .with_context(|| format!("timestamp {nanos} out of range at row {row}"))?;
            records.push(Record {
                id: ids.value(row),
                timestamp,
                device_id: device_ids.value(row).to_string(),
                value: values.value(row),
                table_name: tables.value(row).to_string(),
            });
        }
    }
    Ok(records)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    let idx = batch
        .schema()
        .index_of(name)
        .with_context(|| format!("missing column '{name}'"))?;
    let array = batch.column(idx);
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow!("column '{name}' has unexpected type {}", array.data_type()))
}
