//! Destination object storage for finished archives.

mod lazy;
mod remote;

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

pub use lazy::LazyStore;
pub use remote::ObjectStoreSink;

/// Object storage the archive is uploaded to with a single PUT.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Bucket name, used for reporting only.
    fn bucket(&self) -> &str;

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;
}

/// Reads the finished file at `path` and stores it under `key`. One attempt,
/// no retry. Returns the number of bytes uploaded.
pub async fn upload_file(store: &dyn ArchiveStore, path: &Path, key: &str) -> Result<u64> {
    let body = tokio::fs::read(path)
        .await
        .with_context(|| format!("opening parquet file {}", path.display()))?;
    let size = body.len() as u64;
    store.put(key, body).await?;
    Ok(size)
}
