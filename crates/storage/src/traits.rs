//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Blob store addressed by slash-separated keys
/// (e.g. `steps/manual_4/step_19/image_diagram.png`).
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Write a blob, replacing any existing one. The write is atomic: readers
    /// see either the old content or the new, never a partial file.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Read a whole blob. Fails with `NotFound` when absent.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete a blob. Fails with `NotFound` when absent.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Check that the backend is reachable.
    ///
    /// The default implementation returns Ok(()).
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
