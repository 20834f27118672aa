//! Storage key layout.
//!
//! Three namespaces keep state, locks, and history separable:
//!
//! - `<state_root>/<ref>`: the current state document
//! - `<lock_root>/<ref>`: the lock document
//! - `<version_root>/<ref>/<YYYYMMDDHHMMSS>`: one snapshot per update
//!
//! Prefixes handed to [`crate::BlobStore::list`] always end in `/`, so ref
//! `a` never sees the keys of ref `ab`.

use serde::{Deserialize, Serialize};
use tfstate_types::{Ref, VersionId};

use crate::error::{StoreError, StoreResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyLayout {
    pub state_root: String,
    pub lock_root: String,
    pub version_root: String,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self {
            state_root: "tfstate/store".into(),
            lock_root: "tfstate/lock".into(),
            version_root: "tfstate/version".into(),
        }
    }
}

impl KeyLayout {
    /// Check that every root is a non-empty path and that no root equals
    /// another or sits below it. Overlapping roots would let state listings
    /// pick up lock or version keys.
    pub fn validate(&self) -> StoreResult<()> {
        let roots = [&self.state_root, &self.lock_root, &self.version_root];
        for root in roots {
            if root.split('/').any(str::is_empty) {
                return Err(StoreError::InvalidKey {
                    key: root.clone(),
                    reason: "key root must be a path without empty segments",
                });
            }
        }
        for (i, a) in roots.iter().enumerate() {
            for b in &roots[i + 1..] {
                let (a_dir, b_dir) = (format!("{a}/"), format!("{b}/"));
                if a_dir.starts_with(&b_dir) || b_dir.starts_with(&a_dir) {
                    return Err(StoreError::InvalidKey {
                        key: format!("{a} / {b}"),
                        reason: "key roots overlap",
                    });
                }
            }
        }
        Ok(())
    }

    pub fn state_key(&self, reference: &Ref) -> String {
        format!("{}/{reference}", self.state_root)
    }

    pub fn lock_key(&self, reference: &Ref) -> String {
        format!("{}/{reference}", self.lock_root)
    }

    pub fn version_key(&self, reference: &Ref, version: &VersionId) -> String {
        format!("{}/{reference}/{version}", self.version_root)
    }

    /// Prefix of every current-state key.
    pub fn state_prefix(&self) -> String {
        format!("{}/", self.state_root)
    }

    /// Prefix of every current-state key at or below `scope`.
    pub fn state_scope_prefix(&self, scope: &Ref) -> String {
        format!("{}/{scope}/", self.state_root)
    }

    /// Prefix of every lock key.
    pub fn lock_prefix(&self) -> String {
        format!("{}/", self.lock_root)
    }

    /// Prefix of the version keys of one ref.
    pub fn version_prefix(&self, reference: &Ref) -> String {
        format!("{}/{reference}/", self.version_root)
    }

    /// Recover the ref from a current-state key.
    pub fn ref_from_state_key(&self, key: &str) -> Option<Ref> {
        key.strip_prefix(&self.state_prefix())
            .and_then(|rest| Ref::new(rest).ok())
    }

    /// Recover the version id from a key below [`Self::version_prefix`].
    ///
    /// Keys of nested refs (`<ref>/child/<version>`) are not versions of
    /// `reference` and yield `None`.
    pub fn version_from_key(&self, reference: &Ref, key: &str) -> Option<VersionId> {
        let rest = key.strip_prefix(&self.version_prefix(reference))?;
        if rest.contains('/') {
            return None;
        }
        VersionId::parse(rest).ok()
    }
}
