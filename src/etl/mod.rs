//! Parquet encoding of archive batches.

mod archive_file;
mod sink;

pub use archive_file::{
    archive_schema, read_archive, write_archive, COL_DEVICE_ID, COL_ID, COL_TABLE_NAME,
    COL_TIMESTAMP, COL_VALUE, CREATED_BY, WRITE_CHUNK_ROWS,
};
pub use sink::{BatchSink, ParquetSink};
