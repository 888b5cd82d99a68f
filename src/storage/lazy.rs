use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::ArchiveStore;

/// [`ArchiveStore`] that builds its backend on the first `put`.
///
/// A run with nothing to archive never uploads, so it never reads the
/// storage environment either. A failed build leaves the cell empty and
/// surfaces as the upload error.
pub struct LazyStore<F> {
    bucket: String,
    build: F,
    store: OnceCell<Box<dyn ArchiveStore>>,
}

impl<F> LazyStore<F>
where
    F: Fn(&str) -> Result<Box<dyn ArchiveStore>> + Send + Sync,
{
    pub fn new(bucket: impl Into<String>, build: F) -> Self {
        Self {
            bucket: bucket.into(),
            build,
            store: OnceCell::new(),
        }
    }

    pub fn is_built(&self) -> bool {
        self.store.initialized()
    }
}

#[async_trait]
impl<F> ArchiveStore for LazyStore<F>
where
    F: Fn(&str) -> Result<Box<dyn ArchiveStore>> + Send + Sync,
{
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let store = self
            .store
            .get_or_try_init(|| async { (self.build)(&self.bucket) })
            .await?;
        store.put(key, body).await
    }
}
