//! Sources of key material.
//!
//! A [`KeyProvider`] is consulted on every encrypt and decrypt call, so a
//! provider backed by a file or a secret manager picks up rotations without
//! a restart. Providers return `Ok(None)` when no key is configured; the
//! cipher turns that into [`CryptoError::MissingKey`].

use std::path::PathBuf;

use crate::error::{CryptoError, CryptoResult};

/// Supplies raw key material on demand.
pub trait KeyProvider: Send + Sync {
    fn key_material(&self) -> CryptoResult<Option<Vec<u8>>>;
}

/// Key material fixed at construction.
pub struct StaticKey(Vec<u8>);

impl StaticKey {
    pub fn new(material: impl Into<Vec<u8>>) -> Self {
        Self(material.into())
    }
}

impl KeyProvider for StaticKey {
    fn key_material(&self) -> CryptoResult<Option<Vec<u8>>> {
        if self.0.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.0.clone()))
    }
}

impl std::fmt::Debug for StaticKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StaticKey(<redacted>)")
    }
}

/// Key material produced by a callback, evaluated per call.
pub struct KeyFn<F>(F);

impl<F> KeyFn<F>
where
    F: Fn() -> Option<Vec<u8>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> KeyProvider for KeyFn<F>
where
    F: Fn() -> Option<Vec<u8>> + Send + Sync,
{
    fn key_material(&self) -> CryptoResult<Option<Vec<u8>>> {
        Ok((self.0)())
    }
}

/// Key material read from a file on every call.
///
/// Trailing whitespace is stripped so keys written with `echo` work. A
/// missing file is a [`CryptoError::KeySource`] error, not an absent key:
/// the operator configured a file and it is gone.
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KeyProvider for FileKeyProvider {
    fn key_material(&self) -> CryptoResult<Option<Vec<u8>>> {
        let mut bytes = std::fs::read(&self.path)
            .map_err(|e| CryptoError::KeySource(format!("{}: {e}", self.path.display())))?;
        while bytes.last().is_some_and(|b| b.is_ascii_whitespace()) {
            bytes.pop();
        }
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(bytes))
    }
}
