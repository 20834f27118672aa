//! Advisory locking.
//!
//! ```text
//! Unlocked   --acquire(id)-->         Locked(id)
//! Locked(id) --acquire(id)-->         Locked(id)   refresh
//! Locked(a)  --acquire(b), b != a-->  Conflict(lock a)
//! Locked(id) --release(id)-->         Unlocked
//! Locked(a)  --release(b), b != a-->  Conflict(lock a)
//! Unlocked   --release(any)-->        Unlocked     no-op
//! ```

use tfstate_types::{Lock, LockDocument, Ref};
use tracing::{debug, error};

use crate::backend::Backend;
use crate::error::{BackendError, BackendResult};

impl Backend {
    /// The lock currently held on `reference`, if any.
    pub async fn get_lock(&self, reference: &Ref) -> BackendResult<Option<Lock>> {
        self.init().await?;
        let key = self.layout.lock_key(reference);
        let Some(bytes) = self.store.get(&key).await.map_err(|e| {
            error!(%reference, error = %e, "failed to get lock from state store");
            BackendError::from(e)
        })?
        else {
            return Ok(None);
        };
        let doc = LockDocument::from_bytes(&bytes).map_err(|e| BackendError::Corrupt {
            key,
            reason: e.to_string(),
        })?;
        Ok(Some(doc.lock))
    }

    /// Gate for every mutating operation.
    ///
    /// Passes when the ref is unlocked or locked under `caller_id`. A single
    /// read; nothing prevents another writer from locking right after.
    pub async fn can_lock(&self, reference: &Ref, caller_id: Option<&str>) -> BackendResult<()> {
        match self.get_lock(reference).await? {
            Some(lock) if !lock.is_held_by(caller_id) => {
                debug!(%reference, holder = %lock.id, "state locked by another process");
                Err(BackendError::Locked {
                    reference: reference.clone(),
                    lock,
                })
            }
            _ => Ok(()),
        }
    }

    /// Acquire (or refresh) the lock for `reference`.
    pub async fn lock(&self, reference: &Ref, lock: Lock) -> BackendResult<()> {
        self.can_lock(reference, Some(lock.id.as_str())).await?;
        debug!(%reference, id = %lock.id, "locking state");
        let doc = LockDocument::new(reference.clone(), lock);
        let key = self.layout.lock_key(reference);
        let bytes = doc.to_bytes().map_err(|e| BackendError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.store.put(&key, bytes).await.map_err(|e| {
            error!(%reference, error = %e, "failed to set lock");
            BackendError::from(e)
        })
    }

    /// Release the lock for `reference`. Releasing an unlocked ref succeeds.
    pub async fn unlock(&self, reference: &Ref, lock: &Lock) -> BackendResult<()> {
        self.can_lock(reference, Some(lock.id.as_str())).await?;
        debug!(%reference, id = %lock.id, "unlocking state");
        self.store
            .delete(&self.layout.lock_key(reference))
            .await
            .map(|_| ())
            .map_err(|e| {
                error!(%reference, error = %e, "failed to delete lock");
                BackendError::from(e)
            })
    }
}
