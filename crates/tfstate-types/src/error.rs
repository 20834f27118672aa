use thiserror::Error;

/// Errors produced by type construction and parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid ref {value:?}: {reason}")]
    InvalidRef { value: String, reason: &'static str },

    #[error("invalid version id {0:?}: expected UTC timestamp YYYYMMDDHHMMSS")]
    InvalidVersion(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
