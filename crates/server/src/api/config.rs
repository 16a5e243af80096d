use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::Value;

use crate::state::AppState;

/// GET /api/config
pub async fn config_summary(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(state.config.redacted_summary())
}
