//! Object key layout for uploaded archives.
//!
//! Keys are Hive-style partitioned by the year and month of the newest record
//! in the batch:
//!
//! ```text
//! year=2026/month=06/multi_table_20260615_083000.parquet
//! ```

use time::{OffsetDateTime, UtcOffset};

/// Key token for archives that may mix rows from several tables.
pub const KEY_DISCRIMINATOR: &str = "multi_table";
pub const ARCHIVE_EXTENSION: &str = "parquet";

/// Object key for a batch whose newest record is `latest`, rendered in UTC.
pub fn archive_key(latest: OffsetDateTime) -> String {
    let ts = latest.to_offset(UtcOffset::UTC);
    let date = ts.date();
    let time = ts.time();
    format!(
        "year={:04}/month={:02}/{}_{:04}{:02}{:02}_{:02}{:02}{:02}.{}",
        date.year(),
        date.month() as u8,
        KEY_DISCRIMINATOR,
        date.year(),
        date.month() as u8,
        date.day(),
        time.hour(),
        time.minute(),
        time.second(),
        ARCHIVE_EXTENSION
    )
}

pub fn object_uri(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}
