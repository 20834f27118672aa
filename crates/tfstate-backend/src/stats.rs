use std::collections::BTreeSet;

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::backend::Backend;
use crate::error::BackendResult;

/// Store-wide counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BackendStats {
    /// Refs with a current state.
    pub states: usize,
    /// Locks currently held.
    pub locks: usize,
    /// Locks whose document is older than the requested age.
    pub stale_locks: usize,
    /// Distinct first ref segments among current states (tenants).
    pub identities: usize,
}

impl Backend {
    /// Count states, locks, and tenants across the whole store.
    ///
    /// With `stale_after`, also counts locks last written longer ago than
    /// that; locks have no expiry, so this is the only way to spot
    /// abandoned ones.
    pub async fn stats(&self, stale_after: Option<Duration>) -> BackendResult<BackendStats> {
        let refs = self.list_states().await?;
        let identities: BTreeSet<&str> = refs.iter().map(|r| r.root_segment()).collect();

        let locks = self.store.list(&self.layout.lock_prefix()).await?;
        let stale_locks = match stale_after {
            Some(age) => {
                let cutoff = Utc::now() - age;
                locks.iter().filter(|blob| blob.last_modified < cutoff).count()
            }
            None => 0,
        };

        Ok(BackendStats {
            states: refs.len(),
            locks: locks.len(),
            stale_locks,
            identities: identities.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tfstate_store::InMemoryBlobStore;
    use tfstate_types::{Lock, Ref};

    use crate::backend::{BackendOptions, WriteOptions};

    use super::*;

    fn r(s: &str) -> Ref {
        Ref::new(s).unwrap()
    }

    #[tokio::test]
    async fn empty_store() {
        let b = Backend::new(Arc::new(InMemoryBlobStore::new()), BackendOptions::default());
        assert_eq!(b.stats(None).await.unwrap(), BackendStats::default());
    }

    #[tokio::test]
    async fn counts_states_locks_and_identities() {
        let store = Arc::new(InMemoryBlobStore::new());
        let b = Backend::new(store.clone(), BackendOptions::default());
        for name in ["u1/a", "u1/b", "u2/a"] {
            b.update_state(&r(name), None, json!({}), WriteOptions::plaintext())
                .await
                .unwrap();
        }
        b.lock(&r("u1/a"), Lock::new("L1")).await.unwrap();
        b.lock(&r("u2/a"), Lock::new("L2")).await.unwrap();
        store.set_modified("tfstate/lock/u1/a", Utc::now() - Duration::days(10));

        let stats = b.stats(Some(Duration::days(7))).await.unwrap();
        assert_eq!(
            stats,
            BackendStats {
                states: 3,
                locks: 2,
                stale_locks: 1,
                identities: 2,
            }
        );
        assert_eq!(b.stats(None).await.unwrap().stale_locks, 0);
    }
}
