use hkdf::Hkdf;
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};

const HKDF_SALT: &[u8] = b"tfstate-state-encryption";
const HKDF_INFO: &[u8] = b"tfstate-xchacha20poly1305-v1";

/// A 256-bit symmetric key derived from operator-supplied material.
///
/// Material of any length is stretched with HKDF-SHA256, so a passphrase
/// from the environment and a random 32-byte key file are both acceptable.
/// Derivation is deterministic: the same material always yields the same key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Derive a key from raw material. Empty material is refused.
    pub fn derive(material: &[u8]) -> CryptoResult<Self> {
        if material.is_empty() {
            return Err(CryptoError::MissingKey);
        }
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), material);
        let mut okm = [0u8; 32];
        hk.expand(HKDF_INFO, &mut okm)
            .map_err(|_| CryptoError::KeySource("key derivation failed".into()))?;
        Ok(Self(okm))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short public identifier of the key: hex of the first 8 bytes of its
    /// SHA-256. Safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0);
        hex::encode(&digest[..8])
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionKey(<redacted> fp={})", self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let a = EncryptionKey::derive(b"thisishardlysecure").unwrap();
        let b = EncryptionKey::derive(b"thisishardlysecure").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_material_different_keys() {
        let a = EncryptionKey::derive(b"one").unwrap();
        let b = EncryptionKey::derive(b"two").unwrap();
        assert_ne!(a, b);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn empty_material_is_missing_key() {
        assert_eq!(EncryptionKey::derive(b""), Err(CryptoError::MissingKey));
    }

    #[test]
    fn debug_redacts_key() {
        let key = EncryptionKey::derive(b"secret").unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("redacted"));
        assert!(!debug.contains(&hex::encode(key.as_bytes())));
    }

    #[test]
    fn fingerprint_is_sixteen_hex_chars() {
        let key = EncryptionKey::derive(b"secret").unwrap();
        assert_eq!(key.fingerprint().len(), 16);
    }
}
