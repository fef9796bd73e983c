pub mod local;
pub mod s3;

#[cfg(test)]
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::config::settings::StorageConfig;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("invalid artifact key: {0}")]
    InvalidKey(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// How outputs reach the store once rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Publication {
    /// Keys map to files under `root`; outputs rendered there are already published.
    InPlace { root: PathBuf },
    /// Outputs are rendered in scratch space and must be `put` explicitly.
    Remote,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn fetch(&self, key: &str) -> StoreResult<Bytes>;

    /// Write `bytes` under `key` and return the addressable locator.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<String>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StoreResult<()>;

    fn locate(&self, key: &str) -> String;

    fn publication(&self) -> Publication;
}

pub async fn build_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn ArtifactStore>> {
    let store: Arc<dyn ArtifactStore> = match config {
        StorageConfig::Local {
            root,
            public_base_url,
        } => Arc::new(local::LocalStore::new(root.clone(), public_base_url.clone()).await?),
        StorageConfig::S3 {
            endpoint,
            bucket,
            access_key,
            secret_key,
        } => Arc::new(s3::S3Store::new(endpoint, bucket, access_key, secret_key).await),
    };
    Ok(store)
}

/// Content type for a rendered artifact, by extension.
pub fn content_type_for(key: &str) -> String {
    if key.ends_with(".m3u8") {
        return "application/vnd.apple.mpegurl".to_string();
    }
    if key.ends_with(".ts") {
        return "video/mp2t".to_string();
    }
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
