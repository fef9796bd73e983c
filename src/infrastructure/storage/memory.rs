//! In-memory store for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::{ArtifactStore, Publication, StoreError, StoreResult};

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    removed: Mutex<Vec<String>>,
    put_order: Mutex<Vec<String>>,
    fail_fetch: bool,
    fail_remove: bool,
    fail_put_suffix: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, key: &str, bytes: &'static [u8]) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (Bytes::from_static(bytes), "video/mp4".to_string()));
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    /// Fail every put whose key ends with `suffix`.
    pub fn failing_put(mut self, suffix: &str) -> Self {
        self.fail_put_suffix = Some(suffix.to_string());
        self
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, content_type)| content_type.clone())
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    /// Keys in the order they were written.
    pub fn put_order(&self) -> Vec<String> {
        self.put_order.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn fetch(&self, key: &str) -> StoreResult<Bytes> {
        if self.fail_fetch {
            return Err(StoreError::Backend("fetch disabled".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<String> {
        if let Some(suffix) = &self.fail_put_suffix {
            if key.ends_with(suffix.as_str()) {
                return Err(StoreError::Backend(format!("put rejected for {}", key)));
            }
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, content_type.to_string()));
        self.put_order.lock().unwrap().push(key.to_string());
        Ok(self.locate(key))
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        if self.fail_remove {
            return Err(StoreError::Backend(format!("remove rejected for {}", key)));
        }
        self.objects.lock().unwrap().remove(key);
        self.removed.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn locate(&self, key: &str) -> String {
        format!("mem://{}", key)
    }

    fn publication(&self) -> Publication {
        Publication::Remote
    }
}
