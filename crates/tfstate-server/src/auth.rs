//! Mapping inbound requests to tenant refs.
//!
//! The ref is the only isolation boundary the backend knows about, so the
//! [`RefResolver`] picked at startup decides who sees what.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Query;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tfstate_types::{Ref, TypeError};
use thiserror::Error;

/// The parts of a request a resolver may look at.
#[derive(Clone, Copy, Debug)]
pub struct RequestContext<'a> {
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
}

impl<'a> RequestContext<'a> {
    pub fn new(uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self { uri, headers }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// A non-empty query parameter.
    pub fn query(&self, name: &str) -> Option<String> {
        let Query(params) = Query::<HashMap<String, String>>::try_from_uri(self.uri).ok()?;
        params.get(name).filter(|value| !value.is_empty()).cloned()
    }

    /// Username and password from an `Authorization: Basic` header.
    pub fn basic_auth(&self) -> Option<(String, String)> {
        let value = self.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let (scheme, encoded) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
        let (user, password) = decoded.split_once(':')?;
        Some((user.to_string(), password.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("expecting ref as query parameter")]
    MissingRef,

    #[error(transparent)]
    InvalidRef(#[from] TypeError),

    #[error("missing authentication")]
    MissingCredentials,

    #[error("authorization failed")]
    InvalidCredentials,

    #[error("user {0} is not authorized to use this backend")]
    NotAllowed(String),
}

impl ResolveError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingRef | Self::InvalidRef(_) => StatusCode::BAD_REQUEST,
            Self::MissingCredentials | Self::InvalidCredentials | Self::NotAllowed(_) => {
                StatusCode::UNAUTHORIZED
            }
        }
    }
}

/// Decides the ref a request operates on.
#[async_trait]
pub trait RefResolver: Send + Sync {
    /// The ref for state, lock, and version operations.
    async fn resolve(&self, request: &RequestContext<'_>) -> Result<Ref, ResolveError>;

    /// The listing scope for `/states`. `None` lists every ref in the store.
    async fn scope(&self, request: &RequestContext<'_>) -> Result<Option<Ref>, ResolveError>;
}

/// Takes the ref verbatim from `?ref=`. No authentication.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryRefResolver;

#[async_trait]
impl RefResolver for QueryRefResolver {
    async fn resolve(&self, request: &RequestContext<'_>) -> Result<Ref, ResolveError> {
        let raw = request.query("ref").ok_or(ResolveError::MissingRef)?;
        Ok(Ref::new(raw)?)
    }

    async fn scope(&self, request: &RequestContext<'_>) -> Result<Option<Ref>, ResolveError> {
        match request.query("ref") {
            Some(raw) => Ok(Some(Ref::new(raw)?)),
            None => Ok(None),
        }
    }
}

/// Checks a username and password, returning the caller's stable subject id.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, username: &str, password: &str) -> Option<String>;
}

/// A fixed user table, usually from the server config.
#[derive(Clone, Default)]
pub struct StaticCredentials {
    users: BTreeMap<String, (String, String)>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user whose states live under `subject`.
    pub fn with_user(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        self.users
            .insert(username.into(), (password.into(), subject.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("users", &self.users.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl CredentialVerifier for StaticCredentials {
    async fn verify(&self, username: &str, password: &str) -> Option<String> {
        let (expected, subject) = self.users.get(username)?;
        (expected == password).then(|| subject.clone())
    }
}

/// HTTP basic authentication, one namespace per subject.
///
/// The ref is `<subject>/<path>`, where `path` is `?ref=` if given and the
/// request path otherwise. Listing endpoints map to the subject itself, so a
/// tenant only ever sees its own states.
pub struct BasicAuthResolver {
    verifier: Arc<dyn CredentialVerifier>,
    allow_list: Vec<String>,
}

impl BasicAuthResolver {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            verifier,
            allow_list: Vec::new(),
        }
    }

    /// Restrict access to these usernames. Empty allows everyone the
    /// verifier accepts.
    pub fn with_allow_list(mut self, users: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allow_list = users.into_iter().map(Into::into).collect();
        self
    }

    async fn subject(&self, request: &RequestContext<'_>) -> Result<Ref, ResolveError> {
        let (username, password) = request
            .basic_auth()
            .ok_or(ResolveError::MissingCredentials)?;
        if !self.allow_list.is_empty() && !self.allow_list.contains(&username) {
            return Err(ResolveError::NotAllowed(username));
        }
        let subject = self
            .verifier
            .verify(&username, &password)
            .await
            .ok_or(ResolveError::InvalidCredentials)?;
        Ref::new(subject).map_err(|_| ResolveError::InvalidCredentials)
    }
}

impl std::fmt::Debug for BasicAuthResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthResolver")
            .field("allow_list", &self.allow_list)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RefResolver for BasicAuthResolver {
    async fn resolve(&self, request: &RequestContext<'_>) -> Result<Ref, ResolveError> {
        let subject = self.subject(request).await?;
        let path = match request.query("ref") {
            Some(raw) => raw,
            None => match request.path() {
                "/versions" | "/states" => String::new(),
                path => path.to_string(),
            },
        };
        Ok(subject.join(&path)?)
    }

    async fn scope(&self, request: &RequestContext<'_>) -> Result<Option<Ref>, ResolveError> {
        self.subject(request).await.map(Some)
    }
}
