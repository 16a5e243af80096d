use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use drep_sync::GuardReport;

use super::{api_error, client_key, ApiError};
use crate::rate_limit::RateDecision;
use crate::state::AppState;

/// POST /api/guard/run
///
/// Runs one guard pass inline. `429` when the caller is over its limit,
/// `409` when a pass is already running.
pub async fn guard_run(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<GuardReport>, ApiError> {
    let key = client_key(&headers);
    match state.guard_limiter.check(&key) {
        RateDecision::Limited { retry_after } => {
            tracing::warn!(client = %key, "manual guard run rate-limited");
            return Err(api_error(
                StatusCode::TOO_MANY_REQUESTS,
                format!("rate limited, retry in {}s", retry_after.as_secs().max(1)),
            ));
        }
        RateDecision::Allowed { remaining } => {
            tracing::info!(client = %key, remaining, "manual guard run requested");
        }
    }

    match state.guard.try_run_once().await {
        Some(report) => Ok(Json(report)),
        None => Err(api_error(StatusCode::CONFLICT, "a guard pass is already running")),
    }
}
