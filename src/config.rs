use std::path::PathBuf;

use time::{Duration, OffsetDateTime};

use crate::error::{Error, Result};
use crate::source::TableName;

pub const DEFAULT_CONN_STRING: &str = "postgresql://localhost:5432/iot?sslmode=disable";
pub const DEFAULT_BUCKET: &str = "my-iot-archive";
pub const DEFAULT_TABLE_NAMES: &str = "iot_data";

/// Rows read per table per run.
pub const BATCH_SIZE: usize = 100;
pub const RETENTION_DAYS: i64 = 90;

const STAGING_FILE_NAME: &str = "archive.parquet";

/// Settings for one archival run. Built once at start-up and borrowed by
/// every stage.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub tables: Vec<TableName>,
    pub bucket: String,
    pub batch_size: usize,
    pub retention: Duration,
    /// Local path the parquet file is written to before upload.
    pub staging_path: PathBuf,
}

impl ArchiveConfig {
    pub fn new(tables: Vec<TableName>, bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        if tables.is_empty() {
            return Err(Error::Config("no source tables configured".to_string()));
        }
        if bucket.is_empty() {
            return Err(Error::Config("empty bucket name".to_string()));
        }
        Ok(Self {
            tables,
            bucket,
            batch_size: BATCH_SIZE,
            retention: Duration::days(RETENTION_DAYS),
            staging_path: std::env::temp_dir().join(STAGING_FILE_NAME),
        })
    }

    /// Parses a comma-separated table list, trimming whitespace around names.
    pub fn from_table_list(list: &str, bucket: impl Into<String>) -> Result<Self> {
        let tables = parse_table_list(list)?;
        Self::new(tables, bucket)
    }

    /// `now - retention`. Computed once per run and shared by extract and purge.
    pub fn cutoff(&self, now: OffsetDateTime) -> OffsetDateTime {
        now - self.retention
    }
}

pub fn parse_table_list(list: &str) -> Result<Vec<TableName>> {
    list.split(',').map(|name| TableName::parse(name.trim())).collect()
}
