use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use super::{ArtifactStore, Publication, StoreError, StoreResult};

/// Files under a root directory, served elsewhere from `base_url`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    base_url: String,
}

impl LocalStore {
    pub async fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        info!("✅ Local artifact store at {}", root.display());

        Ok(Self {
            root,
            base_url: base_url.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys are relative, non-empty and may not climb out of the root.
    fn key_to_path(&self, key: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for LocalStore {
    async fn fetch(&self, key: &str) -> StoreResult<Bytes> {
        let path = self.key_to_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, bytes: Bytes, _content_type: &str) -> StoreResult<String> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&path, &bytes).await?;
        debug!(key = %key, size_bytes = bytes.len(), "Stored artifact");

        Ok(self.locate(key))
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.key_to_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn locate(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    fn publication(&self) -> Publication {
        Publication::InPlace {
            root: self.root().to_path_buf(),
        }
    }
}
