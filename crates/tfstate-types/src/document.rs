use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TypeError;
use crate::reference::Ref;

/// Auxiliary tags attached to a state document at write time.
pub type Metadata = Map<String, Value>;

/// The persisted record for one ref's state.
///
/// `state` holds the tenant's raw JSON object when `encrypted` is `false`,
/// and an [`EncryptedPayload`] when it is `true`. The two are never mixed:
/// use [`StateDocument::plaintext`] or [`StateDocument::encrypted`] to build
/// one so the flag always matches the payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(rename = "ref")]
    pub reference: Ref,
    pub state: Value,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub metadata: Metadata,
}

impl StateDocument {
    /// A document storing `state` as-is.
    pub fn plaintext(reference: Ref, state: Value, metadata: Metadata) -> Self {
        Self {
            reference,
            state,
            encrypted: false,
            metadata,
        }
    }

    /// A document storing an encrypted payload in place of the state.
    pub fn encrypted(reference: Ref, payload: EncryptedPayload, metadata: Metadata) -> Self {
        Self {
            reference,
            state: payload.into_value(),
            encrypted: true,
            metadata,
        }
    }

    /// Extract the encrypted payload, if this document carries one.
    pub fn payload(&self) -> Result<Option<EncryptedPayload>, TypeError> {
        if !self.encrypted {
            return Ok(None);
        }
        EncryptedPayload::from_value(&self.state).map(Some)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(bytes).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

/// Ciphertext of a marshaled state, base64-encoded.
///
/// Carries no key identifier or algorithm tag; the sibling `encrypted` flag
/// on [`StateDocument`] is the only marker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub encrypted_data: String,
}

impl EncryptedPayload {
    pub fn new(encrypted_data: impl Into<String>) -> Self {
        Self {
            encrypted_data: encrypted_data.into(),
        }
    }

    pub fn into_value(self) -> Value {
        let mut map = Map::new();
        map.insert("encrypted_data".into(), Value::String(self.encrypted_data));
        Value::Object(map)
    }

    pub fn from_value(value: &Value) -> Result<Self, TypeError> {
        Self::deserialize(value).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn r(s: &str) -> Ref {
        Ref::new(s).unwrap()
    }

    #[test]
    fn wire_format_uses_ref_key() {
        let doc = StateDocument::plaintext(r("alice/proj"), json!({"version": 4}), Metadata::new());
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["ref"], "alice/proj");
        assert_eq!(value["encrypted"], false);
        assert_eq!(value["state"]["version"], 4);
    }

    #[test]
    fn encrypted_document_sets_flag() {
        let doc = StateDocument::encrypted(r("t1"), EncryptedPayload::new("AAAA"), Metadata::new());
        assert!(doc.encrypted);
        assert_eq!(doc.state, json!({"encrypted_data": "AAAA"}));
        assert_eq!(doc.payload().unwrap(), Some(EncryptedPayload::new("AAAA")));
    }

    #[test]
    fn plaintext_document_has_no_payload() {
        let doc = StateDocument::plaintext(r("t1"), json!({}), Metadata::new());
        assert_eq!(doc.payload().unwrap(), None);
    }

    #[test]
    fn encrypted_flag_with_garbage_state_is_an_error() {
        let mut doc = StateDocument::plaintext(r("t1"), json!({"resources": []}), Metadata::new());
        doc.encrypted = true;
        assert!(doc.payload().is_err());
    }

    #[test]
    fn missing_optional_fields_default() {
        let doc = StateDocument::from_bytes(br#"{"ref":"t1","state":{}}"#).unwrap();
        assert!(!doc.encrypted);
        assert!(doc.metadata.is_empty());
    }
}
