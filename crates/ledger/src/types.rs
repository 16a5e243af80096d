//! Typed rows and write payloads for the `sync_log` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error recorded on runs that were started but never finalized.
pub const GHOST_RUN_MESSAGE: &str = "terminated before completion";

/// One job execution as stored in `sync_log`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SyncRun {
    pub id: i64,
    pub sync_type: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub success: bool,
    pub error_message: Option<String>,
    pub metrics: serde_json::Value,
}

impl SyncRun {
    /// Started, never finalized, and older than `cutoff`.
    pub fn is_ghost(&self, cutoff: DateTime<Utc>) -> bool {
        !self.success
            && self.error_message.is_none()
            && self.duration_ms.is_none()
            && self.started_at < cutoff
    }
}

/// Fields written when a run completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCompletion {
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub success: bool,
    pub error_message: Option<String>,
    pub metrics: serde_json::Value,
}

/// A run that already finished elsewhere, imported in bulk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRun {
    pub sync_type: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub metrics: serde_json::Value,
}

impl CompletedRun {
    pub fn duration_ms(&self) -> i64 {
        self.finished_at
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0)
    }
}

/// Latest-run state per sync type plus trailing success/failure counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub sync_type: String,
    pub last_run: DateTime<Utc>,
    pub last_finished: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<i64>,
    pub last_success: bool,
    pub last_error: Option<String>,
    /// Finish time of the most recent successful run, at any age.
    pub last_success_at: Option<DateTime<Utc>>,
    pub success_count: i64,
    pub failure_count: i64,
}
