use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get};
use axum::Router;
use tfstate_backend::{Backend, WriteOptions};
use tower_http::trace::TraceLayer;

use crate::auth::RefResolver;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::handler;

/// How state writes choose between encrypted and plaintext storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WritePolicy {
    pub encrypt_by_default: bool,
    pub allow_override: bool,
}

impl WritePolicy {
    /// `requested` is the raw `?encrypt=` value. Ignored unless overrides
    /// are allowed.
    pub fn options(&self, requested: Option<&str>) -> Result<WriteOptions, ApiError> {
        let encrypt = match requested {
            Some(raw) if self.allow_override => raw
                .parse::<bool>()
                .map_err(|_| ApiError::BadRequest(format!("invalid encrypt value {raw:?}")))?,
            _ => self.encrypt_by_default,
        };
        Ok(WriteOptions { encrypt })
    }
}

/// Everything a handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<Backend>,
    pub resolver: Arc<dyn RefResolver>,
    pub writes: WritePolicy,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            backend: Arc::new(config.build_backend()),
            resolver: config.build_resolver(),
            writes: WritePolicy {
                encrypt_by_default: config.encryption.encrypt_states,
                allow_override: config.encryption.allow_plaintext_override,
            },
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Build the axum router.
///
/// Any path not listed here is a state path: the Terraform `http` backend
/// speaks `GET`, `POST`, `DELETE`, `LOCK` and `UNLOCK` against it.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/stats", get(handler::stats_handler))
        .route("/states", get(handler::list_states_handler))
        .route("/versions", any(handler::versions_handler))
        .fallback(handler::state_handler)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_policy_default_only() {
        let policy = WritePolicy { encrypt_by_default: true, allow_override: false };
        assert!(policy.options(None).unwrap().encrypt);
        assert!(policy.options(Some("false")).unwrap().encrypt);
        assert!(policy.options(Some("garbage")).unwrap().encrypt);
    }

    #[test]
    fn write_policy_override() {
        let policy = WritePolicy { encrypt_by_default: true, allow_override: true };
        assert!(!policy.options(Some("false")).unwrap().encrypt);
        assert!(policy.options(Some("true")).unwrap().encrypt);
        assert!(matches!(policy.options(Some("maybe")), Err(ApiError::BadRequest(_))));
    }
}
