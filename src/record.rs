use time::OffsetDateTime;

use crate::source::{SourceRow, TableName};

/// One archived data point.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub timestamp: OffsetDateTime,
    pub device_id: String,
    pub value: f64,
    /// Table the row was read from. Not a column of the source table.
    pub table_name: String,
}

impl Record {
    pub fn tagged(row: SourceRow, table: &TableName) -> Self {
        Self {
            id: row.id,
            timestamp: row.timestamp,
            device_id: row.device_id,
            value: row.value,
            table_name: table.as_str().to_string(),
        }
    }
}

/// Latest timestamp across the whole batch, `None` when the batch is empty.
pub fn latest_timestamp(records: &[Record]) -> Option<OffsetDateTime> {
    records.iter().map(|record| record.timestamp).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Month, Time};

    fn at(day: u8, hour: u8) -> OffsetDateTime {
        Date::from_calendar_date(2026, Month::March, day)
            .unwrap()
            .with_time(Time::from_hms(hour, 0, 0).unwrap())
            .assume_utc()
    }

    fn record(table: &str, timestamp: OffsetDateTime) -> Record {
        Record {
            id: 1,
            timestamp,
            device_id: "dev-1".to_string(),
            value: 0.5,
            table_name: table.to_string(),
        }
    }

    #[test]
    fn latest_spans_all_tables() {
        let records = vec![
            record("a", at(3, 1)),
            record("a", at(2, 0)),
            record("b", at(9, 23)),
            record("b", at(1, 0)),
        ];
        assert_eq!(latest_timestamp(&records), Some(at(9, 23)));
    }

    #[test]
    fn latest_of_empty_batch() {
        assert_eq!(latest_timestamp(&[]), None);
    }
}
