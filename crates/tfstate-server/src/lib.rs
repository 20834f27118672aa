//! HTTP server for the tfstate remote state backend.
//!
//! Speaks the Terraform `http` backend protocol on any path, plus version
//! history under `/versions`, listing under `/states`, and health and
//! statistics under `/v1`. Which ref a request operates on is decided by the
//! configured [`RefResolver`].

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use auth::{
    BasicAuthResolver, CredentialVerifier, QueryRefResolver, RefResolver, RequestContext,
    ResolveError, StaticCredentials,
};
pub use config::{AuthConfig, EncryptionConfig, MetadataConfig, ServerConfig, StorageConfig, UserConfig};
pub use error::{ApiError, ServerError, ServerResult};
pub use router::{build_router, AppState, WritePolicy};
pub use server::TfStateServer;
