//! HTTP handlers, one module per area.

mod config;
mod epoch;
mod guard;
mod health;
mod score;

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};

pub type ApiError = (StatusCode, Json<Value>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// Rate-limit key for a request: first `x-forwarded-for` hop, then
/// `x-real-ip`, else a shared bucket.
pub(crate) fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

pub use config::config_summary;
pub use epoch::epoch;
pub use guard::guard_run;
pub use health::{health, sync_health, sync_health_type};
pub use score::score;
