use thiserror::Error;

/// Errors from encryption and decryption.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// No key material is configured, or the provider returned none.
    #[error("encryption key is not available")]
    MissingKey,

    /// The key provider failed to load material (e.g. unreadable key file).
    #[error("failed to load encryption key: {0}")]
    KeySource(String),

    #[error("encryption failed")]
    Encrypt,

    /// Authentication failed: wrong key or tampered ciphertext.
    #[error("decryption failed: wrong key or corrupted payload")]
    Decrypt,

    /// The payload is not valid base64 or is too short to hold a nonce and tag.
    #[error("malformed encrypted payload: {0}")]
    MalformedPayload(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
