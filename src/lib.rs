//! Retention archival for IoT time-series tables.
//!
//! A run reads rows older than `now - retention` from each configured
//! Postgres table, writes them to one SNAPPY-compressed parquet file, uploads
//! the file to object storage and only then deletes the archived rows.

pub mod archiver;
pub mod config;
pub mod error;
pub mod etl;
pub mod layout;
pub mod record;
pub mod source;
pub mod storage;

pub use archiver::{Archiver, RunReport, RunState};
pub use config::ArchiveConfig;
pub use error::{Error, Result, Stage};
pub use record::Record;
pub use source::{PgSource, RecordSource, SourceRow, TableName};
pub use storage::{ArchiveStore, LazyStore, ObjectStoreSink};
