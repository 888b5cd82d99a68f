//! The archival run: extract, encode, upload, purge.
//!
//! Stages run strictly in order and each one finishes for every table before
//! the next starts. The object key needs the newest timestamp across all
//! tables, so extraction completes before anything is encoded. Rows are
//! deleted only after the upload has returned success, and the purge reuses
//! the cutoff the extraction ran with.

use std::fmt;
use std::path::Path;

use log::{debug, info, warn};
use time::OffsetDateTime;

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::etl::write_archive;
use crate::layout::{archive_key, object_uri};
use crate::record::{latest_timestamp, Record};
use crate::source::{RecordSource, TableName};
use crate::storage::{upload_file, ArchiveStore};

const READ_PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Extracting,
    Encoding,
    Uploading,
    Purging,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Extracting => "extracting",
            RunState::Encoding => "encoding",
            RunState::Uploading => "uploading",
            RunState::Purging => "purging",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub cutoff: OffsetDateTime,
    pub archived: usize,
    /// `None` when nothing was old enough to archive.
    pub key: Option<String>,
    /// Rows deleted per table, in configured order.
    pub deleted: Vec<(TableName, u64)>,
}

impl RunReport {
    pub fn total_deleted(&self) -> u64 {
        self.deleted.iter().map(|(_, count)| count).sum()
    }
}

pub struct Archiver<'a> {
    config: &'a ArchiveConfig,
    state: RunState,
}

impl<'a> Archiver<'a> {
    pub fn new(config: &'a ArchiveConfig) -> Self {
        Self {
            config,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub async fn run_once(
        &mut self,
        source: &mut dyn RecordSource,
        store: &dyn ArchiveStore,
    ) -> Result<RunReport> {
        self.run_at(source, store, OffsetDateTime::now_utc()).await
    }

    /// Runs with the cutoff derived from `now` instead of the wall clock.
    pub async fn run_at(
        &mut self,
        source: &mut dyn RecordSource,
        store: &dyn ArchiveStore,
        now: OffsetDateTime,
    ) -> Result<RunReport> {
        self.state = RunState::Idle;
        let cutoff = self.config.cutoff(now);
        let result = self.run_stages(source, store, cutoff).await;
        if let Err(err) = &result {
            warn!("archival failed during {} stage", err.stage());
            self.transition(RunState::Failed);
        }
        result
    }

    async fn run_stages(
        &mut self,
        source: &mut dyn RecordSource,
        store: &dyn ArchiveStore,
        cutoff: OffsetDateTime,
    ) -> Result<RunReport> {
        let config = self.config;

        self.transition(RunState::Extracting);
        let batch = extract(source, &config.tables, cutoff, config.batch_size).await?;

        let Some(latest) = latest_timestamp(&batch) else {
            info!("No records to archive");
            self.transition(RunState::Done);
            return Ok(RunReport {
                cutoff,
                archived: 0,
                key: None,
                deleted: Vec::new(),
            });
        };
        let key = archive_key(latest);

        self.transition(RunState::Encoding);
        encode(&batch, &config.staging_path)?;
        info!("Successfully wrote parquet file");

        self.transition(RunState::Uploading);
        upload(store, &config.staging_path, &key).await?;

        self.transition(RunState::Purging);
        let deleted = purge(source, &config.tables, cutoff).await?;

        self.transition(RunState::Done);
        info!(
            "Successfully archived {} total records to {}",
            batch.len(),
            object_uri(store.bucket(), &key)
        );
        Ok(RunReport {
            cutoff,
            archived: batch.len(),
            key: Some(key),
            deleted,
        })
    }

    fn transition(&mut self, next: RunState) {
        debug!("archiver state {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Reads up to `batch_size` expired rows from each table, in table order,
/// tagging every row with the table it came from. Any failure discards the
/// whole batch.
pub async fn extract(
    source: &mut dyn RecordSource,
    tables: &[TableName],
    cutoff: OffsetDateTime,
    batch_size: usize,
) -> Result<Vec<Record>> {
    info!(
        "Starting archival process for tables: {} with batch size: {batch_size}",
        join_tables(tables)
    );

    let mut batch = Vec::new();
    for table in tables {
        info!("Executing query for table {table} with cutoff date: {cutoff}");
        let rows = source
            .fetch_expired(table, cutoff, batch_size)
            .await
            .map_err(|source| Error::Extract {
                table: table.to_string(),
                source,
            })?;

        info!("Starting to read records from table: {table}");
        let count = rows.len();
        for (idx, row) in rows.into_iter().enumerate() {
            batch.push(Record::tagged(row, table));
            if (idx + 1) % READ_PROGRESS_EVERY == 0 {
                info!("Read {} records from {table}", idx + 1);
            }
        }
        info!("Finished reading {count} records from {table}");
    }
    Ok(batch)
}

pub fn encode(batch: &[Record], path: &Path) -> Result<()> {
    write_archive(batch, path).map_err(|source| Error::Encode {
        path: path.to_path_buf(),
        source,
    })
}

pub async fn upload(store: &dyn ArchiveStore, path: &Path, key: &str) -> Result<()> {
    info!("Uploading to S3: {}/{key}", store.bucket());
    let size = upload_file(store, path, key)
        .await
        .map_err(|source| Error::Upload {
            key: key.to_string(),
            source,
        })?;
    info!("Successfully uploaded {size} bytes to S3");
    Ok(())
}

/// Deletes every row older than `cutoff` from each table. Tables purged before
/// a failure stay purged.
pub async fn purge(
    source: &mut dyn RecordSource,
    tables: &[TableName],
    cutoff: OffsetDateTime,
) -> Result<Vec<(TableName, u64)>> {
    let mut deleted = Vec::with_capacity(tables.len());
    for table in tables {
        let count = source
            .purge_expired(table, cutoff)
            .await
            .map_err(|source| Error::Purge {
                table: table.to_string(),
                source,
            })?;
        info!("Deleted {count} records from table {table}");
        deleted.push((table.clone(), count));
    }
    Ok(deleted)
}

fn join_tables(tables: &[TableName]) -> String {
    tables
        .iter()
        .map(TableName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
