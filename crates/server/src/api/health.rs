//! Liveness and sync freshness endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use drep_sync::{HealthReport, OverallStatus, TypeHealth};
use serde::Serialize;

use super::{api_error, ApiError};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub ledger_backend: String,
    pub current_epoch: i64,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ledger_backend: state.ledger.store().backend_name().to_string(),
        current_epoch: state.epoch.current_epoch(),
    })
}

/// GET /api/health/sync
///
/// Always answers with the report body. A ledger that cannot be read
/// yields `503` with `overall = "error"`.
pub async fn sync_health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let report = state
        .classifier
        .check(state.ledger.store().as_ref(), state.store_timeout())
        .await;
    let status = match report.overall {
        OverallStatus::Error => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(report))
}

/// GET /api/health/sync/{sync_type}
///
/// A registered type with no ledger rows is reported as never run;
/// a name that is neither registered nor in the ledger is `404`.
pub async fn sync_health_type(
    State(state): State<Arc<AppState>>,
    Path(sync_type): Path<String>,
) -> Result<Json<TypeHealth>, ApiError> {
    let report = state
        .classifier
        .check(state.ledger.store().as_ref(), state.store_timeout())
        .await;
    if let Some(ref e) = report.error {
        return Err(api_error(StatusCode::SERVICE_UNAVAILABLE, e.clone()));
    }
    if let Some(health) = report.get(&sync_type) {
        return Ok(Json(health.clone()));
    }

    let spec = state
        .classifier
        .registry()
        .require(&sync_type)
        .map_err(|e| api_error(StatusCode::NOT_FOUND, e.to_string()))?;
    Ok(Json(state.classifier.classify_type(&spec.name, None, report.checked_at)))
}
