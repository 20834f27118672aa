//! Metadata hooks: derive side-channel tags from a state at write time.
//!
//! The hook sees the plaintext state before encryption. Its output is
//! stored unencrypted next to the state, so hooks must not copy secrets out
//! of the state.

use std::sync::Arc;

use serde_json::Value;
use tfstate_types::{Metadata, Ref};

pub trait MetadataHook: Send + Sync {
    fn metadata(&self, reference: &Ref, state: &Value) -> Metadata;
}

/// Attaches nothing. The default.
pub struct NoMetadata;

impl MetadataHook for NoMetadata {
    fn metadata(&self, _reference: &Ref, _state: &Value) -> Metadata {
        Metadata::new()
    }
}

/// Attaches the same fixed tags to every write.
pub struct StaticMetadata(pub Metadata);

impl MetadataHook for StaticMetadata {
    fn metadata(&self, _reference: &Ref, _state: &Value) -> Metadata {
        self.0.clone()
    }
}

/// Copies the non-secret header fields of a Terraform state
/// (`version`, `terraform_version`, `serial`, `lineage`) and counts
/// resources.
pub struct TerraformSummary;

impl MetadataHook for TerraformSummary {
    fn metadata(&self, _reference: &Ref, state: &Value) -> Metadata {
        let mut out = Metadata::new();
        for field in ["version", "terraform_version", "serial", "lineage"] {
            if let Some(value) = state.get(field) {
                out.insert(field.into(), value.clone());
            }
        }
        if let Some(resources) = state.get("resources").and_then(Value::as_array) {
            out.insert("resource_count".into(), resources.len().into());
        }
        out
    }
}

/// Runs several hooks and merges their output; later hooks win on key
/// collisions.
#[derive(Default)]
pub struct ChainedMetadata {
    hooks: Vec<Arc<dyn MetadataHook>>,
}

impl ChainedMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: Arc<dyn MetadataHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl MetadataHook for ChainedMetadata {
    fn metadata(&self, reference: &Ref, state: &Value) -> Metadata {
        let mut out = Metadata::new();
        for hook in &self.hooks {
            out.extend(hook.metadata(reference, state));
        }
        out
    }
}
