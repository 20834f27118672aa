use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobInfo, BlobStore};

/// Every blob file carries this extension so that key `a` (file `a.blob`)
/// and key `a/b` (directory `a/`) can coexist on disk.
const BLOB_EXT: &str = ".blob";
const TMP_EXT: &str = ".tmp";

/// File name for one key segment.
///
/// Percent-encoded, with `.` escaped as well: encoded names never contain a
/// dot, so no segment can be mistaken for a blob or temporary file, or for
/// `.`/`..`.
fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).replace('.', "%2E")
}

fn decode_segment(name: &str) -> Option<String> {
    urlencoding::decode(name).ok().map(|s| s.into_owned())
}

/// Filesystem-backed blob store: one file per key below `root`.
///
/// Every write goes to its own uniquely named temporary sibling, which is
/// then renamed over the target, so readers never observe a half-written
/// blob. There is no locking between writers; like every [`BlobStore`],
/// concurrent writers to the same key race and the last rename wins.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_for<'a>(
        &self,
        key: &str,
        segments: impl Iterator<Item = &'a str>,
    ) -> StoreResult<PathBuf> {
        let mut path = self.root.clone();
        for segment in segments {
            match segment {
                "" => return Err(invalid(key, "empty path segment")),
                "." | ".." => return Err(invalid(key, "relative path segment")),
                s => path.push(encode_segment(s)),
            }
        }
        Ok(path)
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let (dir, name) = key.rsplit_once('/').unwrap_or(("", key));
        if name.is_empty() {
            return Err(invalid(key, "key is empty"));
        }
        let mut path = self.dir_for(key, dir.split('/').filter(|_| !dir.is_empty()))?;
        match name {
            "." | ".." => return Err(invalid(key, "relative path segment")),
            name => path.push(format!("{}{BLOB_EXT}", encode_segment(name))),
        }
        Ok(path)
    }

    /// Map a blob file back to its key. Temporary and foreign files yield
    /// `None`.
    fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let mut segments = Vec::new();
        for component in rel.components() {
            let Component::Normal(name) = component else {
                return None;
            };
            segments.push(name.to_str()?);
        }
        let last = segments.pop()?.strip_suffix(BLOB_EXT)?;
        segments
            .into_iter()
            .chain(std::iter::once(last))
            .map(decode_segment)
            .collect::<Option<Vec<_>>>()
            .map(|decoded| decoded.join("/"))
    }
}

fn invalid(key: &str, reason: &'static str) -> StoreError {
    StoreError::InvalidKey {
        key: key.to_string(),
        reason,
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn init(&self) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        debug!(root = %self.root.display(), "filesystem blob store ready");
        Ok(())
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        let path = self.path_for(key)?;
        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            let parent = path
                .parent()
                .ok_or_else(|| std::io::Error::other("blob path has no parent"))?;
            std::fs::create_dir_all(parent)?;
            let mut tmp = tempfile::Builder::new()
                .prefix(".")
                .suffix(TMP_EXT)
                .tempfile_in(parent)?;
            tmp.write_all(&data)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobInfo>> {
        // Walk from the deepest directory fully named by the prefix.
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let start = self.dir_for(prefix, dir_part.split('/').filter(|s| !s.is_empty()))?;

        let store = self.clone();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || -> StoreResult<Vec<BlobInfo>> {
            let mut out = Vec::new();
            if !start.is_dir() {
                return Ok(out);
            }
            for entry in WalkDir::new(&start) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if e.io_error().is_some_and(|io| io.kind() == ErrorKind::NotFound) => {
                        continue
                    }
                    Err(e) => return Err(std::io::Error::other(e.to_string()).into()),
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let Some(key) = store.key_for(entry.path()) else {
                    continue;
                };
                if !key.starts_with(&prefix) {
                    continue;
                }
                let meta = match entry.metadata() {
                    Ok(meta) => meta,
                    Err(_) => continue,
                };
                let last_modified: DateTime<Utc> =
                    meta.modified().map(DateTime::from).unwrap_or_else(|_| Utc::now());
                out.push(BlobInfo {
                    key,
                    size: meta.len(),
                    last_modified,
                });
            }
            Ok(out)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}
