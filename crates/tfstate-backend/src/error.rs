use std::fmt;

use tfstate_crypto::CryptoError;
use tfstate_store::StoreError;
use tfstate_types::{Lock, Ref};
use thiserror::Error;

/// Classification of a failure, independent of any transport.
///
/// The server maps each kind to exactly one response status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Nothing at the requested key. Expected, never logged as an error.
    NotFound,
    /// The ref is locked by someone else.
    Conflict,
    /// The request itself is malformed.
    BadRequest,
    /// The caller could not be mapped to a ref.
    Unauthorized,
    /// Store, crypto, or serialization failure.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not-found",
            Self::Conflict => "conflict",
            Self::BadRequest => "bad-request",
            Self::Unauthorized => "unauthorized",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no {what} for ref {reference}")]
    NotFound { reference: Ref, what: &'static str },

    /// Carries the holder's lock so the caller can see who blocks it.
    #[error("ref {reference} is locked by {:?}", lock.id)]
    Locked { reference: Ref, lock: Lock },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Encryption was requested (or a stored document is encrypted) but
    /// the backend was built without a cipher.
    #[error("encryption is not configured")]
    EncryptionUnavailable,

    #[error("corrupt document at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Locked { .. } => ErrorKind::Conflict,
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::Store(_)
            | Self::Crypto(_)
            | Self::EncryptionUnavailable
            | Self::Corrupt { .. } => ErrorKind::Internal,
        }
    }

    /// The blocking lock, for conflict responses.
    pub fn holder(&self) -> Option<&Lock> {
        match self {
            Self::Locked { lock, .. } => Some(lock),
            _ => None,
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;
