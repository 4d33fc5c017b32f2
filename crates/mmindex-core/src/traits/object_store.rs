//! Object store trait for large payloads kept outside the vector index.

use async_trait::async_trait;

use crate::error::IndexResult;

/// Stores raw payloads (original images, full texts) and hands back a
/// reference URI that is recorded in document metadata.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under `key` and return a reference URI.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> IndexResult<String>;

    /// Fetch the bytes behind a reference URI.
    async fn get(&self, uri: &str) -> IndexResult<Vec<u8>>;

    /// Delete the object behind a reference URI.
    async fn delete(&self, uri: &str) -> IndexResult<()>;
}
