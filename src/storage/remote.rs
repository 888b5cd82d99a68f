use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};

use super::ArchiveStore;
use crate::layout::object_uri;

/// [`ArchiveStore`] over any `object_store` backend.
pub struct ObjectStoreSink {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStoreSink {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// S3 client for `bucket`, with region and credentials taken from the
    /// standard `AWS_*` environment variables.
    pub fn s3_from_env(bucket: &str) -> Result<Self> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .with_context(|| format!("configuring s3 client for bucket {bucket}"))?;
        Ok(Self::new(Arc::new(store), bucket))
    }

    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}

#[async_trait]
impl ArchiveStore for ObjectStoreSink {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let location = ObjectPath::parse(key).with_context(|| format!("invalid object key {key}"))?;
        self.store
            .put(&location, PutPayload::from(body))
            .await
            .with_context(|| format!("uploading to {}", object_uri(&self.bucket, key)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    #[tokio::test]
    async fn put_stores_bytes_under_key() {
        let sink = ObjectStoreSink::new(Arc::new(InMemory::new()), "archive");
        let key = "year=2026/month=06/multi_table_20260605_080309.parquet";
        sink.put(key, b"PAR1".to_vec()).await.expect("put");

        let stored = sink
            .inner()
            .get(&ObjectPath::parse(key).unwrap())
            .await
            .expect("get")
            .bytes()
            .await
            .expect("bytes");
        assert_eq!(stored.as_ref(), b"PAR1");
        assert_eq!(sink.bucket(), "archive");
    }
}
