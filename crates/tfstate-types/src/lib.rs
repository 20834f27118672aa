//! Foundation types for the tfstate remote state backend.
//!
//! Every other tfstate crate depends on `tfstate-types`. The types here
//! describe what is persisted; they carry no storage or crypto logic.
//!
//! # Key Types
//!
//! - [`Ref`]: Opaque tenant identifier, the sole isolation key
//! - [`StateDocument`]: Persisted state record (plaintext or encrypted)
//! - [`EncryptedPayload`]: Ciphertext wrapper stored in place of the state
//! - [`Lock`] / [`LockDocument`]: Advisory lock as sent by the client
//! - [`VersionId`]: Fixed-width UTC timestamp naming a historical snapshot

pub mod document;
pub mod error;
pub mod lock;
pub mod reference;
pub mod version;

pub use document::{EncryptedPayload, Metadata, StateDocument};
pub use error::TypeError;
pub use lock::{Lock, LockDocument};
pub use reference::Ref;
pub use version::VersionId;
