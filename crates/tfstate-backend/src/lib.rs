//! State orchestration for the tfstate remote state backend.
//!
//! [`Backend`] implements the protocol operations a Terraform `http`
//! backend client expects (get, update, delete, lock, unlock) plus version
//! history, retention, and statistics, on top of any
//! [`tfstate_store::BlobStore`].
//!
//! # Guarantees
//!
//! - At most one current state document per ref; updates overwrite.
//! - Encrypted writes fail closed: if no key is available nothing is stored.
//! - Every successful update appends one immutable version snapshot.
//!   Failure to write the snapshot is logged, not surfaced.
//!
//! # Non-guarantees
//!
//! Locking is advisory. The lock check and the following write are
//! separate store calls, so two concurrent writers to the same ref can both
//! pass the check. Well-behaved clients that honour `423 Locked` responses
//! are safe under low contention.

pub mod backend;
pub mod error;
pub mod hooks;
pub mod lock;
pub mod stats;
pub mod versions;

pub use backend::{Backend, BackendOptions, Clock, LoadedState, UpdateOutcome, WriteOptions};
pub use error::{BackendError, BackendResult, ErrorKind};
pub use hooks::{ChainedMetadata, MetadataHook, NoMetadata, StaticMetadata, TerraformSummary};
pub use stats::BackendStats;
pub use versions::{RestoreOutcome, RetentionOutcome};
