//! Key-addressed blob storage for the tfstate backend.
//!
//! The backend persists every document as an opaque byte blob under a
//! string key. This crate defines that contract and ships two
//! implementations.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`InMemoryBlobStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`FsBlobStore`] -- one file per key below a root directory
//!
//! # Design Rules
//!
//! 1. `put` overwrites; there is no compare-and-swap.
//! 2. "Not found" is `Ok(None)` from `get`, never an error.
//! 3. `delete` of a missing key succeeds and reports `false`.
//! 4. Listing order is unspecified; callers sort.
//! 5. The store never interprets blob contents.
//! 6. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod keys;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use keys::KeyLayout;
pub use memory::InMemoryBlobStore;
pub use traits::{BlobInfo, BlobStore};
