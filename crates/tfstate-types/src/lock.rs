use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TypeError;
use crate::reference::Ref;

/// Lock information as sent by the client on `LOCK`/`UNLOCK`.
///
/// Only `ID` is inspected. Everything else (`Operation`, `Who`, `Created`,
/// ...) is kept in `extra` and written back verbatim so the client can show
/// who holds the lock.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Lock {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Lock {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extra: Map::new(),
        }
    }

    /// Attach a passthrough field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Whether a caller presenting `caller_id` owns this lock.
    ///
    /// A missing caller id is compared as the empty string.
    pub fn is_held_by(&self, caller_id: Option<&str>) -> bool {
        self.id == caller_id.unwrap_or_default()
    }
}

/// A lock as persisted at the ref's lock key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockDocument {
    #[serde(rename = "ref")]
    pub reference: Ref,
    pub lock: Lock,
}

impl LockDocument {
    pub fn new(reference: Ref, lock: Lock) -> Self {
        Self { reference, lock }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(bytes).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
