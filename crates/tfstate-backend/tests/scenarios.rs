//! End-to-end behaviour of the orchestrator over real store backends.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tfstate_backend::{Backend, BackendOptions, ErrorKind, WriteOptions};
use tfstate_crypto::StateCipher;
use tfstate_store::{BlobInfo, BlobStore, FsBlobStore, InMemoryBlobStore, StoreError, StoreResult};
use tfstate_types::{Lock, Ref, StateDocument};

fn r(s: &str) -> Ref {
    Ref::new(s).unwrap()
}

fn encrypted_backend(store: Arc<dyn BlobStore>) -> Backend {
    Backend::new(
        store,
        BackendOptions {
            cipher: Some(StateCipher::with_static_key("thisishardlysecure")),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn scenario_a_plaintext_roundtrip() {
    let backend = encrypted_backend(Arc::new(InMemoryBlobStore::new()));
    let state = json!({"version": 4, "resources": []});
    backend
        .update_state(&r("alice/proj"), None, state.clone(), WriteOptions::plaintext())
        .await
        .unwrap();
    let loaded = backend.get_state(&r("alice/proj")).await.unwrap().unwrap();
    assert_eq!(loaded.state, state);
}

#[tokio::test]
async fn scenario_b_encrypted_at_rest() {
    let store = Arc::new(InMemoryBlobStore::new());
    let backend = encrypted_backend(store.clone());
    let state = json!({"version": 4, "resources": []});
    backend
        .update_state(&r("alice/proj"), None, state.clone(), WriteOptions::encrypted())
        .await
        .unwrap();

    let raw = store.get("tfstate/store/alice/proj").await.unwrap().unwrap();
    let persisted = StateDocument::from_bytes(&raw).unwrap();
    assert!(persisted.encrypted);
    assert!(persisted.payload().unwrap().is_some());
    assert_ne!(persisted.state, state);

    let loaded = backend.get_state(&r("alice/proj")).await.unwrap().unwrap();
    assert_eq!(loaded.state, state);
}

#[tokio::test]
async fn scenario_c_lock_conflicts() {
    let backend = encrypted_backend(Arc::new(InMemoryBlobStore::new()));
    let t1 = r("t1");

    backend.lock(&t1, Lock::new("L1")).await.unwrap();

    let err = backend.lock(&t1, Lock::new("L2")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let body = serde_json::to_value(err.holder().unwrap()).unwrap();
    assert_eq!(body["ID"], "L1");

    let err = backend.unlock(&t1, &Lock::new("L2")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    backend.unlock(&t1, &Lock::new("L1")).await.unwrap();
    backend.lock(&t1, Lock::new("L2")).await.unwrap();
}

#[tokio::test]
async fn filesystem_store_full_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let backend = encrypted_backend(Arc::new(FsBlobStore::new(dir.path())));
    backend.init().await.unwrap();

    let parent = r("u1");
    let child = r("u1/network");
    backend
        .update_state(&parent, None, json!({"serial": 1}), WriteOptions::encrypted())
        .await
        .unwrap();
    backend
        .update_state(&child, None, json!({"serial": 2}), WriteOptions::encrypted())
        .await
        .unwrap();

    assert_eq!(backend.get_state(&parent).await.unwrap().unwrap().state, json!({"serial": 1}));
    assert_eq!(backend.get_state(&child).await.unwrap().unwrap().state, json!({"serial": 2}));
    assert_eq!(backend.list_states().await.unwrap(), vec![parent.clone(), child.clone()]);
    assert_eq!(backend.list_versions(&parent).await.unwrap().len(), 1);
    assert_eq!(backend.list_versions(&child).await.unwrap().len(), 1);

    backend.lock(&child, Lock::new("L1")).await.unwrap();
    assert_eq!(backend.stats(None).await.unwrap().locks, 1);
    backend.delete_state(&child, Some("L1")).await.unwrap();
    assert_eq!(backend.get_state(&child).await.unwrap(), None);
}

#[tokio::test]
async fn filesystem_store_accepts_any_valid_ref() {
    let dir = tempfile::tempdir().unwrap();
    let backend = encrypted_backend(Arc::new(FsBlobStore::new(dir.path())));

    let refs: Vec<Ref> = ["a", "a.blob/x", "backup.blob", "envs/prod.tmp", "team\\ops", "50%/..hidden"]
        .into_iter()
        .map(r)
        .collect();
    for (serial, reference) in refs.iter().enumerate() {
        backend
            .update_state(reference, None, json!({"serial": serial}), WriteOptions::encrypted())
            .await
            .unwrap();
        backend.lock(reference, Lock::new("L1")).await.unwrap();
    }
    for (serial, reference) in refs.iter().enumerate() {
        let loaded = backend.get_state(reference).await.unwrap().unwrap();
        assert_eq!(loaded.state, json!({"serial": serial}), "{reference}");
        assert_eq!(backend.list_versions(reference).await.unwrap().len(), 1, "{reference}");
    }

    let mut expected = refs.clone();
    expected.sort();
    assert_eq!(backend.list_states().await.unwrap(), expected);
    assert_eq!(backend.stats(None).await.unwrap().locks, refs.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn filesystem_store_concurrent_updates_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(encrypted_backend(Arc::new(FsBlobStore::new(dir.path()))));
    let reference = r("u1/contended");

    let mut handles = Vec::new();
    for serial in 0..12u64 {
        let backend = backend.clone();
        let reference = reference.clone();
        handles.push(tokio::spawn(async move {
            backend
                .update_state(&reference, None, json!({"serial": serial}), WriteOptions::encrypted())
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let loaded = backend.get_state(&reference).await.unwrap().unwrap();
    let serial = loaded.state["serial"].as_u64().unwrap();
    assert!(serial < 12);
    assert!(!backend.list_versions(&reference).await.unwrap().is_empty());
}

/// Accepts current-state writes but fails every version write.
struct FailingVersions {
    inner: InMemoryBlobStore,
}

#[async_trait]
impl BlobStore for FailingVersions {
    async fn put(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        if key.starts_with("tfstate/version/") {
            return Err(StoreError::Io(std::io::Error::other("bucket quota exceeded")));
        }
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobInfo>> {
        self.inner.list(prefix).await
    }
}

#[tokio::test]
async fn version_write_failure_does_not_fail_update() {
    let backend = encrypted_backend(Arc::new(FailingVersions {
        inner: InMemoryBlobStore::new(),
    }));
    let outcome = backend
        .update_state(&r("t1"), None, json!({"serial": 1}), WriteOptions::encrypted())
        .await
        .unwrap();
    assert_eq!(outcome.version, None);
    assert_eq!(backend.get_state(&r("t1")).await.unwrap().unwrap().state, json!({"serial": 1}));
    assert!(backend.list_versions(&r("t1")).await.unwrap().is_empty());
}

/// Every call fails, as an unreachable object store would.
struct Unreachable;

#[async_trait]
impl BlobStore for Unreachable {
    async fn put(&self, _key: &str, _data: Vec<u8>) -> StoreResult<()> {
        Err(StoreError::Io(std::io::Error::other("connection refused")))
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
        Err(StoreError::Io(std::io::Error::other("connection refused")))
    }

    async fn delete(&self, _key: &str) -> StoreResult<bool> {
        Err(StoreError::Io(std::io::Error::other("connection refused")))
    }

    async fn list(&self, _prefix: &str) -> StoreResult<Vec<BlobInfo>> {
        Err(StoreError::Io(std::io::Error::other("connection refused")))
    }
}

#[tokio::test]
async fn store_failure_is_internal_not_a_lock_decision() {
    let backend = encrypted_backend(Arc::new(Unreachable));
    let err = backend.lock(&r("t1"), Lock::new("A")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    let err = backend.get_state(&r("t1")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}
