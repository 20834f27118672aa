use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::traits::{BlobInfo, BlobStore};

#[derive(Clone)]
struct Entry {
    data: Vec<u8>,
    modified: DateTime<Utc>,
}

/// In-memory, BTreeMap-based blob store.
///
/// Intended for tests and the `memory` storage mode. All blobs are held
/// behind a `RwLock`; blobs are cloned on read and write. Data is lost when
/// the store is dropped.
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Entry>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of every key in the store.
    pub fn keys(&self) -> Vec<String> {
        self.blobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Overwrite the modification time of a blob. Returns `false` if absent.
    ///
    /// Lets tests age locks without sleeping.
    pub fn set_modified(&self, key: &str, at: DateTime<Utc>) -> bool {
        let mut map = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        match map.get_mut(key) {
            Some(entry) => {
                entry.modified = at;
                true
            }
            None => false,
        }
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        let mut map = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        map.insert(
            key.to_string(),
            Entry {
                data,
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let map = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(key).map(|entry| entry.data.clone()))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut map = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        Ok(map.remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobInfo>> {
        let map = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| BlobInfo {
                key: key.clone(),
                size: entry.data.len() as u64,
                last_modified: entry.modified,
            })
            .collect())
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .finish()
    }
}
