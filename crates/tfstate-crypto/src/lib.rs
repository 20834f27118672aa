//! Encryption of state payloads at rest.
//!
//! Provides XChaCha20-Poly1305 encryption of JSON state with keys derived
//! from operator-supplied material via HKDF-SHA256, and the [`KeyProvider`]
//! seam through which that material is obtained.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.
//! There is no plaintext fallback: if no key is available every operation
//! fails with [`CryptoError::MissingKey`].

pub mod cipher;
pub mod error;
pub mod key;
pub mod provider;

pub use cipher::StateCipher;
pub use error::{CryptoError, CryptoResult};
pub use key::EncryptionKey;
pub use provider::{FileKeyProvider, KeyFn, KeyProvider, StaticKey};
