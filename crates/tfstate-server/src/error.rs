use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tfstate_backend::{BackendError, ErrorKind};
use tfstate_crypto::CryptoError;
use thiserror::Error;
use tracing::warn;

use crate::auth::ResolveError;

/// Startup and serving failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("encryption key error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// A failed request, rendered as an HTTP response.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{0}")]
    BadRequest(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    Unauthorized(&'static str),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Backend(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::LOCKED,
                ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
                ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Resolve(e) => e.status(),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            // Terraform prints the holder from the body of a 423.
            Self::Backend(e) if e.holder().is_some() => {
                return (status, Json(e.holder().cloned())).into_response();
            }
            Self::Backend(e) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                warn!(error = %e, "request failed");
                return (status, "internal error").into_response();
            }
            Self::Resolve(e) => warn!(error = %e, "failed to resolve ref"),
            _ => {}
        }
        (status, self.to_string()).into_response()
    }
}
