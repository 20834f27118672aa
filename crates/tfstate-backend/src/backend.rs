use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tfstate_crypto::StateCipher;
use tfstate_store::{BlobStore, KeyLayout};
use tfstate_types::{Metadata, Ref, StateDocument, VersionId};
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};

use crate::error::{BackendError, BackendResult};
use crate::hooks::{MetadataHook, NoMetadata};

/// Source of the instant that names each new version snapshot.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Construction-time wiring for a [`Backend`].
pub struct BackendOptions {
    pub layout: KeyLayout,
    /// `None` means encrypted writes and reads of encrypted documents fail.
    pub cipher: Option<StateCipher>,
    pub metadata: Arc<dyn MetadataHook>,
    /// Defaults to the wall clock.
    pub clock: Clock,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            layout: KeyLayout::default(),
            cipher: None,
            metadata: Arc::new(NoMetadata),
            clock: Arc::new(Utc::now),
        }
    }
}

/// Per-write options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteOptions {
    pub encrypt: bool,
}

impl WriteOptions {
    pub fn encrypted() -> Self {
        Self { encrypt: true }
    }

    pub fn plaintext() -> Self {
        Self { encrypt: false }
    }
}

/// Encrypt unless told otherwise.
impl Default for WriteOptions {
    fn default() -> Self {
        Self::encrypted()
    }
}

/// A state as handed back to callers: always plaintext.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedState {
    pub state: Value,
    pub metadata: Metadata,
    /// Whether the stored document was encrypted.
    pub encrypted_at_rest: bool,
}

/// Result of a successful update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The snapshot written alongside the update, or `None` if writing it
    /// failed (the current state was still stored).
    pub version: Option<VersionId>,
    pub encrypted: bool,
}

/// The state orchestrator.
///
/// Cheap to share behind an `Arc`; holds no per-request state.
pub struct Backend {
    pub(crate) store: Arc<dyn BlobStore>,
    pub(crate) layout: KeyLayout,
    cipher: Option<StateCipher>,
    metadata: Arc<dyn MetadataHook>,
    clock: Clock,
    initialized: OnceCell<()>,
}

impl Backend {
    pub fn new(store: Arc<dyn BlobStore>, options: BackendOptions) -> Self {
        Self {
            store,
            layout: options.layout,
            cipher: options.cipher,
            metadata: options.metadata,
            clock: options.clock,
            initialized: OnceCell::new(),
        }
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    pub fn has_cipher(&self) -> bool {
        self.cipher.is_some()
    }

    /// Initialize the underlying store. Runs once; later calls are no-ops.
    ///
    /// Every operation calls this first, so explicit use is only needed to
    /// surface store problems at startup.
    pub async fn init(&self) -> BackendResult<()> {
        self.initialized
            .get_or_try_init(|| async {
                self.store.init().await.map_err(|e| {
                    error!(error = %e, "failed to initialize state store");
                    BackendError::from(e)
                })
            })
            .await?;
        Ok(())
    }

    // ---- state ----

    /// Read and decrypt the current state. `None` if the ref has none.
    pub async fn get_state(&self, reference: &Ref) -> BackendResult<Option<LoadedState>> {
        self.init().await?;
        debug!(%reference, "getting state");
        let key = self.layout.state_key(reference);
        match self.read_document(&key).await? {
            Some(doc) => self.open(&key, doc).map(Some),
            None => Ok(None),
        }
    }

    /// Replace the current state and append a version snapshot.
    ///
    /// Rejected with [`BackendError::Locked`] if the ref is locked under an
    /// id other than `caller_lock_id`.
    pub async fn update_state(
        &self,
        reference: &Ref,
        caller_lock_id: Option<&str>,
        state: Value,
        options: WriteOptions,
    ) -> BackendResult<UpdateOutcome> {
        self.init().await?;
        if !state.is_object() {
            return Err(BackendError::BadRequest("state must be a JSON object".into()));
        }
        self.can_lock(reference, caller_lock_id).await?;
        debug!(%reference, encrypt = options.encrypt, "setting state");

        let metadata = self.metadata.metadata(reference, &state);
        let document = if options.encrypt {
            let cipher = self.cipher.as_ref().ok_or(BackendError::EncryptionUnavailable)?;
            let payload = cipher.encrypt(&state).map_err(|e| {
                error!(%reference, error = %e, "failed to encrypt state");
                BackendError::from(e)
            })?;
            StateDocument::encrypted(reference.clone(), payload, metadata)
        } else {
            StateDocument::plaintext(reference.clone(), state, metadata)
        };
        let bytes = document.to_bytes().map_err(|e| BackendError::Corrupt {
            key: self.layout.state_key(reference),
            reason: e.to_string(),
        })?;

        self.store
            .put(&self.layout.state_key(reference), bytes.clone())
            .await
            .map_err(|e| {
                error!(%reference, error = %e, "failed to write state");
                BackendError::from(e)
            })?;

        let version = VersionId::from_datetime((self.clock)());
        let version = match self
            .store
            .put(&self.layout.version_key(reference, &version), bytes)
            .await
        {
            Ok(()) => Some(version),
            Err(e) => {
                warn!(%reference, %version, error = %e, "state stored but version snapshot failed");
                None
            }
        };

        Ok(UpdateOutcome {
            version,
            encrypted: document.encrypted,
        })
    }

    /// Delete the current state. History is kept.
    pub async fn delete_state(
        &self,
        reference: &Ref,
        caller_lock_id: Option<&str>,
    ) -> BackendResult<()> {
        self.init().await?;
        self.can_lock(reference, caller_lock_id).await?;
        debug!(%reference, "deleting state");
        if self.store.delete(&self.layout.state_key(reference)).await? {
            Ok(())
        } else {
            Err(BackendError::NotFound {
                reference: reference.clone(),
                what: "state",
            })
        }
    }

    /// Every ref that has a current state, sorted.
    pub async fn list_states(&self) -> BackendResult<Vec<Ref>> {
        self.init().await?;
        let mut refs: Vec<Ref> = self
            .store
            .list(&self.layout.state_prefix())
            .await?
            .into_iter()
            .filter_map(|blob| self.layout.ref_from_state_key(&blob.key))
            .collect();
        refs.sort();
        Ok(refs)
    }

    /// Current states below `scope`, as paths relative to it, sorted.
    pub async fn list_states_under(&self, scope: &Ref) -> BackendResult<Vec<String>> {
        self.init().await?;
        let prefix = self.layout.state_scope_prefix(scope);
        let mut keys: Vec<String> = self
            .store
            .list(&prefix)
            .await?
            .into_iter()
            .filter_map(|blob| blob.key.strip_prefix(&prefix).map(str::to_string))
            .collect();
        keys.sort();
        Ok(keys)
    }

    // ---- shared helpers ----

    pub(crate) async fn read_document(&self, key: &str) -> BackendResult<Option<StateDocument>> {
        let Some(bytes) = self.store.get(key).await? else {
            return Ok(None);
        };
        StateDocument::from_bytes(&bytes)
            .map(Some)
            .map_err(|e| BackendError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Turn a stored document into plaintext, decrypting if needed.
    pub(crate) fn open(&self, key: &str, doc: StateDocument) -> BackendResult<LoadedState> {
        let Some(payload) = doc.payload().map_err(|e| BackendError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?
        else {
            return Ok(LoadedState {
                state: doc.state,
                metadata: doc.metadata,
                encrypted_at_rest: false,
            });
        };

        let cipher = self.cipher.as_ref().ok_or(BackendError::EncryptionUnavailable)?;
        let state = cipher.decrypt(&payload).map_err(|e| {
            error!(reference = %doc.reference, error = %e, "failed to decrypt state");
            BackendError::from(e)
        })?;
        Ok(LoadedState {
            state,
            metadata: doc.metadata,
            encrypted_at_rest: true,
        })
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("layout", &self.layout)
            .field("cipher", &self.cipher.is_some())
            .finish_non_exhaustive()
    }
}
