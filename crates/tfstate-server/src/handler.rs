use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tfstate_types::{Lock, VersionId};
use tracing::debug;

use crate::auth::{RequestContext, ResolveError};
use crate::error::ApiError;
use crate::router::AppState;

type ApiResult = Result<Response, ApiError>;

#[derive(Debug, Deserialize)]
struct VersionBody {
    version: String,
}

#[derive(Debug, Deserialize)]
struct KeepBody {
    keep: usize,
}

fn parse_body<T: DeserializeOwned>(body: &[u8], what: &str) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("error decoding {what}: {e}")))
}

fn parse_version(body: &[u8]) -> Result<VersionId, ApiError> {
    let VersionBody { version } = parse_body(body, "version request")?;
    VersionId::parse(&version).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Health check handler.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Store-wide counters. Only for callers whose listing scope is the whole
/// store; `?stale_days=N` also counts locks older than N days.
pub async fn stats_handler(
    State(app): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> ApiResult {
    let ctx = RequestContext::new(&uri, &headers);
    if app.resolver.scope(&ctx).await?.is_some() {
        return Err(ApiError::Unauthorized("statistics require store-wide access"));
    }
    let stale_after = match ctx.query("stale_days") {
        Some(raw) => {
            let days: u32 = raw
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("invalid stale_days {raw:?}")))?;
            Some(Duration::days(i64::from(days)))
        }
        None => None,
    };
    let stats = app.backend.stats(stale_after).await?;
    Ok(Json(stats).into_response())
}

/// `GET /states`: every ref for store-wide callers, paths relative to the
/// tenant otherwise.
pub async fn list_states_handler(
    State(app): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> ApiResult {
    let ctx = RequestContext::new(&uri, &headers);
    let states: Vec<String> = match app.resolver.scope(&ctx).await? {
        Some(scope) => app.backend.list_states_under(&scope).await?,
        None => app
            .backend
            .list_states()
            .await?
            .into_iter()
            .map(|r| r.to_string())
            .collect(),
    };
    Ok(Json(states).into_response())
}

/// Version history of a ref, dispatched on method.
///
/// - `GET` lists version ids, oldest first
/// - `RETRIEVE` with `{"version"}` returns that snapshot
/// - `PUT` with `{"version"}` restores it as the current state
/// - `DELETE` with `{"keep"}` prunes all but the newest N
pub async fn versions_handler(
    State(app): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let ctx = RequestContext::new(&uri, &headers);
    match method.as_str() {
        "GET" => {
            // Authenticate before complaining about the query.
            let reference = app.resolver.resolve(&ctx).await?;
            if ctx.query("ref").is_none() {
                return Err(ResolveError::MissingRef.into());
            }
            let versions = app.backend.list_versions(&reference).await?;
            Ok(Json(versions).into_response())
        }
        "RETRIEVE" => {
            let reference = app.resolver.resolve(&ctx).await?;
            let version = parse_version(&body)?;
            match app.backend.retrieve_version(&reference, &version).await? {
                Some(loaded) => Ok(Json(loaded.state).into_response()),
                None => Ok(StatusCode::NO_CONTENT.into_response()),
            }
        }
        "PUT" => {
            let reference = app.resolver.resolve(&ctx).await?;
            let version = parse_version(&body)?;
            let lock_id = ctx.query("ID");
            let outcome = app
                .backend
                .restore_version(&reference, &version, lock_id.as_deref())
                .await?;
            Ok(Json(outcome).into_response())
        }
        "DELETE" => {
            let reference = app.resolver.resolve(&ctx).await?;
            let KeepBody { keep } = parse_body(&body, "retention request")?;
            let outcome = app.backend.keep_versions(&reference, keep).await?;
            Ok(Json(outcome).into_response())
        }
        _ => Err(ApiError::MethodNotAllowed),
    }
}

/// The Terraform `http` backend protocol, on any other path.
pub async fn state_handler(
    State(app): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let ctx = RequestContext::new(&uri, &headers);
    match method.as_str() {
        "GET" | "POST" | "DELETE" | "LOCK" | "UNLOCK" => {}
        _ => return Err(ApiError::MethodNotAllowed),
    }
    let reference = app.resolver.resolve(&ctx).await?;
    debug!(%method, %reference, "state request");

    match method.as_str() {
        "GET" => match app.backend.get_state(&reference).await? {
            Some(loaded) => Ok(Json(loaded.state).into_response()),
            None => Ok(StatusCode::NO_CONTENT.into_response()),
        },
        "POST" => {
            let state: Value = parse_body(&body, "state")?;
            let options = app.writes.options(ctx.query("encrypt").as_deref())?;
            let lock_id = ctx.query("ID");
            app.backend
                .update_state(&reference, lock_id.as_deref(), state, options)
                .await?;
            Ok(StatusCode::OK.into_response())
        }
        "DELETE" => {
            let lock_id = ctx.query("ID");
            app.backend.delete_state(&reference, lock_id.as_deref()).await?;
            Ok(StatusCode::OK.into_response())
        }
        "LOCK" => {
            let lock: Lock = parse_body(&body, "lock")?;
            app.backend.lock(&reference, lock).await?;
            Ok(StatusCode::OK.into_response())
        }
        _ => {
            // `terraform force-unlock` may send no body.
            let lock = if body.iter().all(u8::is_ascii_whitespace) {
                Lock::default()
            } else {
                parse_body(&body, "lock")?
            };
            app.backend.unlock(&reference, &lock).await?;
            Ok(StatusCode::OK.into_response())
        }
    }
}
