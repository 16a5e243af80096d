use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EpochQuery {
    pub ts: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochResponse {
    pub epoch: i64,
    pub ts: i64,
    pub epoch_start: i64,
}

/// GET /api/epoch?ts=<unix seconds>
pub async fn epoch(
    State(state): State<Arc<AppState>>,
    Query(q): Query<EpochQuery>,
) -> Json<EpochResponse> {
    let ts = q.ts.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let epoch = state.epoch.epoch_of(ts);
    Json(EpochResponse {
        epoch,
        ts,
        epoch_start: state.epoch.epoch_start(epoch),
    })
}
