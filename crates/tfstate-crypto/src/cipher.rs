use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use serde_json::Value;
use tfstate_types::EncryptedPayload;

use crate::error::{CryptoError, CryptoResult};
use crate::key::EncryptionKey;
use crate::provider::{KeyProvider, StaticKey};

const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

/// Encrypts and decrypts state JSON with XChaCha20-Poly1305.
///
/// Wire layout of the decoded `encrypted_data`:
/// `nonce (24 bytes) || ciphertext || tag (16 bytes)`.
///
/// A fresh random nonce is drawn for every encryption, so encrypting the
/// same state twice produces different payloads.
#[derive(Clone)]
pub struct StateCipher {
    provider: Arc<dyn KeyProvider>,
}

impl StateCipher {
    pub fn new(provider: Arc<dyn KeyProvider>) -> Self {
        Self { provider }
    }

    /// Cipher over a fixed key given as raw material.
    pub fn with_static_key(material: impl Into<Vec<u8>>) -> Self {
        Self::new(Arc::new(StaticKey::new(material)))
    }

    /// Resolve the current key from the provider.
    pub fn current_key(&self) -> CryptoResult<EncryptionKey> {
        let material = self.provider.key_material()?.ok_or(CryptoError::MissingKey)?;
        EncryptionKey::derive(&material)
    }

    /// Marshal `state` to JSON and seal it.
    pub fn encrypt(&self, state: &Value) -> CryptoResult<EncryptedPayload> {
        let key = self.current_key()?;
        let plaintext =
            serde_json::to_vec(state).map_err(|e| CryptoError::Serialization(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let aead = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        let sealed = aead
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(EncryptedPayload::new(STANDARD.encode(out)))
    }

    /// Open a payload produced by [`Self::encrypt`] and parse the JSON inside.
    pub fn decrypt(&self, payload: &EncryptedPayload) -> CryptoResult<Value> {
        let key = self.current_key()?;
        let data = STANDARD
            .decode(payload.encrypted_data.as_bytes())
            .map_err(|e| CryptoError::MalformedPayload(e.to_string()))?;
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::MalformedPayload(format!(
                "payload is {} bytes, shorter than nonce and tag",
                data.len()
            )));
        }

        let (nonce, sealed) = data.split_at(NONCE_LEN);
        let aead = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        let plaintext = aead
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::Decrypt)?;

        serde_json::from_slice(&plaintext).map_err(|e| CryptoError::Serialization(e.to_string()))
    }
}

impl std::fmt::Debug for StateCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::KeyFn;
    use proptest::prelude::*;
    use serde_json::json;

    fn cipher(key: &str) -> StateCipher {
        StateCipher::with_static_key(key)
    }

    #[test]
    fn encrypt_then_decrypt() {
        let c = cipher("k1");
        let state = json!({"version": 4, "resources": [{"type": "aws_s3_bucket"}]});
        let payload = c.encrypt(&state).unwrap();
        assert_eq!(c.decrypt(&payload).unwrap(), state);
    }

    #[test]
    fn ciphertext_is_not_plaintext_json() {
        let c = cipher("k1");
        let payload = c.encrypt(&json!({"secret": "hunter2"})).unwrap();
        assert!(!payload.encrypted_data.contains("hunter2"));
        assert!(serde_json::from_str::<Value>(&payload.encrypted_data).is_err());
    }

    #[test]
    fn nonces_differ_between_encryptions() {
        let c = cipher("k1");
        let state = json!({"a": 1});
        assert_ne!(c.encrypt(&state).unwrap(), c.encrypt(&state).unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let payload = cipher("right").encrypt(&json!({"a": 1})).unwrap();
        assert_eq!(cipher("wrong").decrypt(&payload), Err(CryptoError::Decrypt));
    }

    #[test]
    fn tampered_payload_fails() {
        let c = cipher("k1");
        let payload = c.encrypt(&json!({"a": 1})).unwrap();
        let mut raw = STANDARD.decode(&payload.encrypted_data).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = EncryptedPayload::new(STANDARD.encode(raw));
        assert_eq!(c.decrypt(&tampered), Err(CryptoError::Decrypt));
    }

    #[test]
    fn truncated_or_garbage_payload_is_malformed() {
        let c = cipher("k1");
        let short = EncryptedPayload::new(STANDARD.encode([0u8; 10]));
        assert!(matches!(c.decrypt(&short), Err(CryptoError::MalformedPayload(_))));
        let garbage = EncryptedPayload::new("not base64!!");
        assert!(matches!(c.decrypt(&garbage), Err(CryptoError::MalformedPayload(_))));
    }

    #[test]
    fn missing_key_fails_closed() {
        let c = StateCipher::new(Arc::new(KeyFn::new(|| None)));
        assert_eq!(c.encrypt(&json!({})), Err(CryptoError::MissingKey));
        assert_eq!(cipher("").encrypt(&json!({})), Err(CryptoError::MissingKey));
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary_objects(
            entries in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..8),
            key in "[ -~]{1,32}",
        ) {
            let state = serde_json::to_value(entries).unwrap();
            let c = cipher(&key);
            let payload = c.encrypt(&state).unwrap();
            prop_assert_eq!(c.decrypt(&payload).unwrap(), state);
        }
    }
}
