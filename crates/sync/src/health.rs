//! Health classification of sync types from ledger snapshots.
//!
//! Classification is recomputed on every read; nothing is cached.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use drep_ledger::{HealthSnapshot, LedgerStore};
use serde::{Serialize, Serializer};

use crate::registry::SyncRegistry;

/// Window the success/failure counts cover.
pub const COUNT_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Healthy,
    Degraded,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Critical,
    /// No ledger data at all.
    Unknown,
    /// The ledger could not be read.
    Error,
}

impl From<Level> for OverallStatus {
    fn from(level: Level) -> Self {
        match level {
            Level::Healthy => Self::Healthy,
            Level::Degraded => Self::Degraded,
            Level::Critical => Self::Critical,
        }
    }
}

/// Minutes since `last_run`, or infinity when the type never ran.
pub fn stale_minutes(last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match last_run {
        Some(t) => now.signed_duration_since(t).num_milliseconds() as f64 / 60_000.0,
        None => f64::INFINITY,
    }
}

/// Level rule: failure first, then twice-stale, then stale.
pub fn classify_level(failed: bool, stale_mins: f64, threshold_mins: i64) -> Level {
    let threshold = threshold_mins as f64;
    if failed {
        Level::Critical
    } else if stale_mins > threshold && stale_mins > 2.0 * threshold {
        Level::Critical
    } else if stale_mins > threshold {
        Level::Degraded
    } else {
        Level::Healthy
    }
}

fn finite_or_null<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        s.serialize_some(&((value * 10.0).round() / 10.0))
    } else {
        s.serialize_none()
    }
}

/// Classified state of one sync type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeHealth {
    pub sync_type: String,
    pub level: Level,
    /// Serialized as `null` when the type never ran.
    #[serde(serialize_with = "finite_or_null")]
    pub stale_mins: f64,
    pub threshold_mins: i64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_finished: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<i64>,
    /// `None` while the latest run is still in flight or the type never ran.
    pub last_success: Option<bool>,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub success_count: i64,
    pub failure_count: i64,
    pub in_flight: bool,
}

impl TypeHealth {
    pub fn is_stale(&self) -> bool {
        self.stale_mins > self.threshold_mins as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub overall: OverallStatus,
    pub per_type: Vec<TypeHealth>,
    pub checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn get(&self, sync_type: &str) -> Option<&TypeHealth> {
        self.per_type.iter().find(|t| t.sync_type == sync_type)
    }
}

pub struct HealthClassifier {
    registry: Arc<SyncRegistry>,
    ghost_threshold: chrono::Duration,
}

impl HealthClassifier {
    pub fn new(registry: Arc<SyncRegistry>, ghost_threshold: chrono::Duration) -> Self {
        Self {
            registry,
            ghost_threshold,
        }
    }

    pub fn registry(&self) -> &SyncRegistry {
        &self.registry
    }

    /// Classify one type. `snapshot` is `None` for a registered type that
    /// never ran.
    pub fn classify_type(
        &self,
        sync_type: &str,
        snapshot: Option<&HealthSnapshot>,
        now: DateTime<Utc>,
    ) -> TypeHealth {
        let threshold_mins = self.registry.health_threshold(sync_type);
        let Some(snap) = snapshot else {
            let stale_mins = f64::INFINITY;
            return TypeHealth {
                sync_type: sync_type.to_string(),
                level: classify_level(false, stale_mins, threshold_mins),
                stale_mins,
                threshold_mins,
                last_run: None,
                last_finished: None,
                last_duration_ms: None,
                last_success: None,
                last_error: None,
                last_success_at: None,
                success_count: 0,
                failure_count: 0,
                in_flight: false,
            };
        };

        let stale_mins = stale_minutes(Some(snap.last_run), now);
        let in_flight =
            snap.last_finished.is_none() && snap.last_run >= now - self.ghost_threshold;
        let last_success = (!in_flight).then_some(snap.last_success);
        let failed = last_success == Some(false);

        TypeHealth {
            sync_type: sync_type.to_string(),
            level: classify_level(failed, stale_mins, threshold_mins),
            stale_mins,
            threshold_mins,
            last_run: Some(snap.last_run),
            last_finished: snap.last_finished,
            last_duration_ms: snap.last_duration_ms,
            last_success,
            last_error: snap.last_error.clone(),
            last_success_at: snap.last_success_at,
            success_count: snap.success_count,
            failure_count: snap.failure_count,
            in_flight,
        }
    }

    /// Classify every snapshot plus every registered type missing from them.
    ///
    /// Registered types come first in registry order, then unregistered
    /// types seen in the ledger, sorted by name.
    pub fn classify(&self, snapshots: &[HealthSnapshot], now: DateTime<Utc>) -> HealthReport {
        if snapshots.is_empty() {
            return HealthReport {
                overall: OverallStatus::Unknown,
                per_type: Vec::new(),
                checked_at: now,
                error: None,
            };
        }

        let mut per_type: Vec<TypeHealth> = self
            .registry
            .iter()
            .map(|spec| {
                let snap = snapshots.iter().find(|s| s.sync_type == spec.name);
                self.classify_type(&spec.name, snap, now)
            })
            .collect();

        let mut extra: Vec<&HealthSnapshot> = snapshots
            .iter()
            .filter(|s| self.registry.get(&s.sync_type).is_none())
            .collect();
        extra.sort_by(|a, b| a.sync_type.cmp(&b.sync_type));
        per_type.extend(
            extra
                .into_iter()
                .map(|s| self.classify_type(&s.sync_type, Some(s), now)),
        );

        let overall = per_type
            .iter()
            .map(|t| t.level)
            .max()
            .map_or(OverallStatus::Unknown, OverallStatus::from);

        HealthReport {
            overall,
            per_type,
            checked_at: now,
            error: None,
        }
    }

    /// Read snapshots from `store` and classify them.
    ///
    /// A store failure or timeout yields an `error` report, never a panic
    /// or an `Err`.
    pub async fn check(&self, store: &dyn LedgerStore, timeout: Duration) -> HealthReport {
        let now = Utc::now();
        let since = now - chrono::Duration::hours(COUNT_WINDOW_HOURS);
        let result = match tokio::time::timeout(timeout, store.latest_snapshots(since)).await {
            Ok(r) => r.map_err(|e| e.to_string()),
            Err(_) => Err(format!("ledger read timed out after {}ms", timeout.as_millis())),
        };

        match result {
            Ok(snapshots) => self.classify(&snapshots, now),
            Err(e) => {
                tracing::warn!(backend = store.backend_name(), error = %e, "sync health check failed");
                HealthReport {
                    overall: OverallStatus::Error,
                    per_type: Vec::new(),
                    checked_at: now,
                    error: Some(e),
                }
            }
        }
    }
}
