//! Storage test utilities.

use async_trait::async_trait;
use bytes::Bytes;
use guideforge_storage::{BlobStore, StorageError, StorageResult};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Blob store wrapper whose `delete` fails for chosen keys and records
/// every delete it is asked to perform.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct FaultyBlobStore {
    inner: Arc<dyn BlobStore>,
    failing_deletes: Mutex<HashSet<String>>,
    delete_attempts: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FaultyBlobStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self {
            inner,
            failing_deletes: Mutex::new(HashSet::new()),
            delete_attempts: Mutex::new(Vec::new()),
        }
    }

    /// Make every future delete of `key` fail with an I/O error.
    pub fn fail_delete(&self, key: &str) {
        self.failing_deletes.lock().unwrap().insert(key.to_string());
    }

    /// Keys passed to `delete`, in call order.
    pub fn delete_attempts(&self) -> Vec<String> {
        self.delete_attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for FaultyBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.delete_attempts.lock().unwrap().push(key.to_string());
        if self.failing_deletes.lock().unwrap().contains(key) {
            return Err(StorageError::Io(std::io::Error::other(
                "injected delete failure",
            )));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}
