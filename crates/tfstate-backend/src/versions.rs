use tfstate_types::{Ref, VersionId};
use tracing::{debug, error};

use crate::backend::{Backend, LoadedState};
use crate::error::{BackendError, BackendResult};

/// Result of [`Backend::restore_version`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RestoreOutcome {
    pub version: VersionId,
    pub encrypted: bool,
}

/// Result of [`Backend::keep_versions`].
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RetentionOutcome {
    pub kept: Vec<VersionId>,
    pub removed: Vec<VersionId>,
}

impl Backend {
    /// Version ids of `reference`, oldest first.
    ///
    /// Keys that are not valid ids, and versions of nested refs, are
    /// skipped.
    pub async fn list_versions(&self, reference: &Ref) -> BackendResult<Vec<VersionId>> {
        self.init().await?;
        let blobs = self.store.list(&self.layout.version_prefix(reference)).await?;
        let mut versions: Vec<VersionId> = blobs
            .iter()
            .filter_map(|blob| self.layout.version_from_key(reference, &blob.key))
            .collect();
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    /// Read and decrypt a historical snapshot. `None` if it does not exist.
    pub async fn retrieve_version(
        &self,
        reference: &Ref,
        version: &VersionId,
    ) -> BackendResult<Option<LoadedState>> {
        self.init().await?;
        debug!(%reference, %version, "retrieving version");
        let key = self.layout.version_key(reference, version);
        match self.read_document(&key).await? {
            Some(doc) => self.open(&key, doc).map(Some),
            None => Ok(None),
        }
    }

    /// Make a historical snapshot the current state.
    ///
    /// Requires lock ownership like an update. The snapshot is copied as
    /// stored (an encrypted snapshot stays encrypted, its metadata is kept);
    /// no new version is appended.
    pub async fn restore_version(
        &self,
        reference: &Ref,
        version: &VersionId,
        caller_lock_id: Option<&str>,
    ) -> BackendResult<RestoreOutcome> {
        self.init().await?;
        self.can_lock(reference, caller_lock_id).await?;
        debug!(%reference, %version, "restoring version");

        let key = self.layout.version_key(reference, version);
        let Some(doc) = self.read_document(&key).await? else {
            return Err(BackendError::NotFound {
                reference: reference.clone(),
                what: "version",
            });
        };
        let bytes = doc.to_bytes().map_err(|e| BackendError::Corrupt {
            key,
            reason: e.to_string(),
        })?;
        self.store
            .put(&self.layout.state_key(reference), bytes)
            .await
            .map_err(|e| {
                error!(%reference, %version, error = %e, "failed to restore version");
                BackendError::from(e)
            })?;

        Ok(RestoreOutcome {
            version: version.clone(),
            encrypted: doc.encrypted,
        })
    }

    /// Delete every version of `reference` except the `last` newest.
    ///
    /// Stops at the first failed delete; versions removed before it stay
    /// removed.
    pub async fn keep_versions(
        &self,
        reference: &Ref,
        last: usize,
    ) -> BackendResult<RetentionOutcome> {
        let mut versions = self.list_versions(reference).await?;
        let cut = versions.len().saturating_sub(last);
        let kept = versions.split_off(cut);

        let mut removed = Vec::with_capacity(versions.len());
        for version in versions {
            self.store
                .delete(&self.layout.version_key(reference, &version))
                .await
                .map_err(|e| {
                    error!(%reference, %version, error = %e, "failed to delete version");
                    BackendError::from(e)
                })?;
            removed.push(version);
        }
        debug!(%reference, kept = kept.len(), removed = removed.len(), "applied version retention");
        Ok(RetentionOutcome { kept, removed })
    }
}
