use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;

/// A listed blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobInfo {
    /// Full key, including any prefix passed to `list`.
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Key-addressed blob storage.
///
/// All implementations must satisfy these invariants:
/// - `put` replaces any existing blob at the key.
/// - `get` of a missing key is `Ok(None)`; `Err` means the store failed.
/// - `delete` tolerates missing keys.
/// - No atomicity across calls is promised. Callers that read then write
///   must accept that another writer may interleave.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Prepare the backend (create directories, verify buckets, ...).
    ///
    /// Must be idempotent. The default does nothing.
    async fn init(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Write `data` at `key`, overwriting.
    async fn put(&self, key: &str, data: Vec<u8>) -> StoreResult<()>;

    /// Read the blob at `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Delete the blob at `key`. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// List every blob whose key starts with `prefix`, recursively.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobInfo>>;
}
