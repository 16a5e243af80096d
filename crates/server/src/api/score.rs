use axum::Json;
use drep_core::{compose_detailed, PillarMetrics, ScoreBreakdown, WeightSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    #[serde(flatten)]
    pub pillars: PillarMetrics,
    #[serde(default)]
    pub weights: Option<WeightSet>,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub score: u8,
    pub breakdown: ScoreBreakdown,
}

/// POST /api/score
pub async fn score(Json(req): Json<ScoreRequest>) -> Json<ScoreResponse> {
    if let Some(ref w) = req.weights {
        if !w.is_normalized() {
            tracing::warn!(sum = w.sum(), "custom score weights do not sum to 1.0");
        }
    }
    let breakdown = compose_detailed(&req.pillars, req.weights.as_ref());
    Json(ScoreResponse {
        score: breakdown.score,
        breakdown,
    })
}
