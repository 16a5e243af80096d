//! Freshness guard: the periodic corrective pass over the sync ledger.
//!
//! One pass runs three steps in order:
//!
//! 1. **Ghost repair.** Runs that started before the ghost threshold and
//!    were never finalized are finalized as failed with
//!    [`GHOST_RUN_MESSAGE`] and a zero duration.
//! 2. **Staleness recovery.** Each registered type whose latest run
//!    started longer ago than its guard threshold is re-triggered
//!    through its refresh entry point, unless a failed run started inside
//!    the recent-failure window (an external retry already owns it) or a
//!    run is in flight.
//!    Types are handled one at a time; each trigger is bounded by the
//!    refresh timeout.
//! 3. **Failure escalation.** Types whose latest run failed with a genuine
//!    error get one urgent alert when they enter that state.
//!
//! Alerts and telemetry are best-effort. Nothing in a pass returns an
//! error; problems are logged and collected in the [`GuardReport`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use drep_core::config::GuardConfig;
use drep_ledger::{HealthSnapshot, RunCompletion, SyncLedger, GHOST_RUN_MESSAGE};
use drep_notify::{AlertContext, AlertKind, Dispatcher, Telemetry, TelemetryEvent, TemplateRenderer};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::health::{stale_minutes, COUNT_WINDOW_HOURS};
use crate::refresh::{RefreshError, RefreshOutcome, RefreshTrigger};
use crate::registry::{SyncRegistry, SyncTypeSpec};

/// Telemetry event emitted after a successful recovery.
pub const SELF_HEALED_EVENT: &str = "sync_self_healed";

/// Prefix of the error recorded when the guard's own re-trigger fails.
pub const GUARD_RECOVERY_PREFIX: &str = "freshness guard recovery failed";

#[derive(Debug, Clone)]
pub struct GuardSettings {
    pub ghost_threshold: chrono::Duration,
    pub recent_failure_window: chrono::Duration,
    pub refresh_timeout: Duration,
    pub store_timeout: Duration,
}

impl From<&GuardConfig> for GuardSettings {
    fn from(c: &GuardConfig) -> Self {
        Self {
            ghost_threshold: chrono::Duration::minutes(c.ghost_threshold_mins.max(1)),
            recent_failure_window: chrono::Duration::minutes(c.recent_failure_mins.max(0)),
            refresh_timeout: Duration::from_secs(c.refresh_timeout_secs.max(1)),
            store_timeout: Duration::from_secs(c.store_timeout_secs.max(1)),
        }
    }
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self::from(&GuardConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveredType {
    pub sync_type: String,
    /// `None` when the type had never run.
    pub stale_mins: Option<f64>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedRecovery {
    pub sync_type: String,
    pub error: String,
}

/// Summary of one guard pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardReport {
    pub ghosts_repaired: usize,
    pub recovered: Vec<RecoveredType>,
    pub skipped_backoff: Vec<String>,
    pub skipped_in_flight: Vec<String>,
    pub failed: Vec<FailedRecovery>,
    pub escalated: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_error: Option<String>,
    pub duration_ms: u64,
}

impl GuardReport {
    pub fn recovered_types(&self) -> Vec<&str> {
        self.recovered.iter().map(|r| r.sync_type.as_str()).collect()
    }
}

/// Latest finished run failed with a real error, not a repaired ghost or
/// a failed guard re-trigger (which already alerted).
fn is_genuine_failure(snap: &HealthSnapshot) -> bool {
    if snap.last_success || snap.last_finished.is_none() {
        return false;
    }
    match snap.last_error.as_deref() {
        Some(GHOST_RUN_MESSAGE) => false,
        Some(e) if e.starts_with(GUARD_RECOVERY_PREFIX) => false,
        _ => true,
    }
}

pub struct FreshnessGuard {
    ledger: SyncLedger,
    registry: Arc<SyncRegistry>,
    trigger: Arc<dyn RefreshTrigger>,
    dispatcher: Arc<Dispatcher>,
    telemetry: Arc<Telemetry>,
    renderer: TemplateRenderer,
    settings: GuardSettings,
    /// Types already alerted for a genuine failure.
    escalated: Mutex<HashSet<String>>,
    /// Serializes passes from the background loop and manual runs.
    pass: Mutex<()>,
}

impl FreshnessGuard {
    pub fn new(
        ledger: SyncLedger,
        registry: Arc<SyncRegistry>,
        trigger: Arc<dyn RefreshTrigger>,
        dispatcher: Arc<Dispatcher>,
        telemetry: Arc<Telemetry>,
        settings: GuardSettings,
    ) -> Self {
        Self {
            ledger,
            registry,
            trigger,
            dispatcher,
            telemetry,
            renderer: TemplateRenderer::new(),
            settings,
            escalated: Mutex::new(HashSet::new()),
            pass: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &GuardSettings {
        &self.settings
    }

    /// Run one pass, waiting for any pass already in progress.
    pub async fn run_once(&self) -> GuardReport {
        let _pass = self.pass.lock().await;
        self.run_pass().await
    }

    /// Run one pass unless another is in progress.
    pub async fn try_run_once(&self) -> Option<GuardReport> {
        let _pass = self.pass.try_lock().ok()?;
        Some(self.run_pass().await)
    }

    async fn run_pass(&self) -> GuardReport {
        let started = Instant::now();
        let now = Utc::now();
        let mut report = GuardReport {
            ghosts_repaired: self.repair_ghosts(now).await,
            ..GuardReport::default()
        };

        match self.snapshots(now).await {
            Ok(snapshots) => self.recover_stale(&snapshots, now, &mut report).await,
            Err(e) => {
                warn!(error = %e, "freshness guard could not read ledger, skipping recovery");
                report.store_error = Some(e);
            }
        }

        // Re-read so types recovered above are judged on their new state.
        match self.snapshots(Utc::now()).await {
            Ok(snapshots) => report.escalated = self.escalate_failures(&snapshots).await,
            Err(e) => {
                warn!(error = %e, "freshness guard could not read ledger, skipping escalation");
                report.store_error.get_or_insert(e);
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            ghosts_repaired = report.ghosts_repaired,
            recovered = report.recovered.len(),
            skipped_backoff = report.skipped_backoff.len(),
            failed = report.failed.len(),
            escalated = report.escalated.len(),
            duration_ms = report.duration_ms,
            "freshness guard pass complete"
        );
        report
    }

    async fn snapshots(&self, now: DateTime<Utc>) -> Result<Vec<HealthSnapshot>, String> {
        let since = now - chrono::Duration::hours(COUNT_WINDOW_HOURS);
        self.ledger
            .bounded(self.ledger.store().latest_snapshots(since))
            .await
            .map_err(|e| e.to_string())
    }

    /// Finalize every ghost run. Returns how many rows were repaired.
    pub async fn repair_ghosts(&self, now: DateTime<Utc>) -> usize {
        let store = self.ledger.store();
        let cutoff = now - self.settings.ghost_threshold;
        let ghosts = match self.ledger.bounded(store.find_ghosts(cutoff)).await {
            Ok(g) => g,
            Err(e) => {
                warn!(error = %e, "ghost lookup failed");
                return 0;
            }
        };

        let mut repaired = 0;
        for ghost in ghosts {
            let completion = RunCompletion {
                finished_at: now,
                duration_ms: 0,
                success: false,
                error_message: Some(GHOST_RUN_MESSAGE.to_string()),
                metrics: serde_json::json!({ "repairedBy": "freshness-guard" }),
            };
            match self.ledger.bounded(store.finalize_run(ghost.id, &completion)).await {
                Ok(true) => {
                    repaired += 1;
                    info!(
                        sync_type = %ghost.sync_type,
                        run_id = ghost.id,
                        started_at = %ghost.started_at,
                        "repaired ghost sync run"
                    );
                }
                Ok(false) => debug!(run_id = ghost.id, "ghost already finalized"),
                Err(e) => warn!(run_id = ghost.id, error = %e, "failed to repair ghost run"),
            }
        }
        repaired
    }

    async fn recover_stale(
        &self,
        snapshots: &[HealthSnapshot],
        now: DateTime<Utc>,
        report: &mut GuardReport,
    ) {
        for spec in self.registry.iter() {
            let snap = snapshots.iter().find(|s| s.sync_type == spec.name);
            let stale_mins = stale_minutes(snap.map(|s| s.last_run), now);
            if stale_mins <= spec.guard_threshold_mins as f64 {
                continue;
            }

            if let Some(s) = snap {
                if s.last_finished.is_none() && s.last_run >= now - self.settings.ghost_threshold {
                    debug!(sync_type = %spec.name, "stale type has a run in flight, not retriggering");
                    report.skipped_in_flight.push(spec.name.clone());
                    continue;
                }
            }

            if self.has_recent_failure(&spec.name, now).await {
                info!(
                    sync_type = %spec.name,
                    stale_mins,
                    "recent failed run, leaving retry to the scheduler"
                );
                report.skipped_backoff.push(spec.name.clone());
                continue;
            }

            let stale = stale_mins.is_finite().then_some(stale_mins);
            match self.trigger_bounded(spec).await {
                Ok(outcome) => {
                    info!(
                        sync_type = %spec.name,
                        stale_mins,
                        status = %outcome.status,
                        "stale sync type self-healed"
                    );
                    self.emit_self_healed(spec, stale, &outcome.status).await;
                    let mut ctx = AlertContext::new(&spec.name, spec.guard_threshold_mins);
                    ctx.stale_mins = stale;
                    ctx.status = Some(outcome.status.clone());
                    self.alert(AlertKind::SelfHealed, &ctx).await;
                    report.recovered.push(RecoveredType {
                        sync_type: spec.name.clone(),
                        stale_mins: stale,
                        status: outcome.status,
                    });
                }
                Err(e) => {
                    let error = e.to_string();
                    warn!(sync_type = %spec.name, error = %error, "stale sync type recovery failed");
                    self.record_failed_attempt(spec, &error).await;
                    let mut ctx = AlertContext::new(&spec.name, spec.guard_threshold_mins);
                    ctx.stale_mins = stale;
                    ctx.error = Some(error.clone());
                    self.alert(AlertKind::RecoveryFailed, &ctx).await;
                    report.failed.push(FailedRecovery {
                        sync_type: spec.name.clone(),
                        error,
                    });
                }
            }
        }
    }

    async fn has_recent_failure(&self, sync_type: &str, now: DateTime<Utc>) -> bool {
        let since = now - self.settings.recent_failure_window;
        match self
            .ledger
            .bounded(self.ledger.store().has_recent_failure(sync_type, since))
            .await
        {
            Ok(found) => found,
            Err(e) => {
                warn!(sync_type, error = %e, "recent-failure lookup failed, treating as none");
                false
            }
        }
    }

    async fn trigger_bounded(
        &self,
        spec: &SyncTypeSpec,
    ) -> Result<RefreshOutcome, RefreshError> {
        let timeout = self.settings.refresh_timeout;
        match tokio::time::timeout(timeout, self.trigger.trigger(spec)).await {
            Ok(result) => result,
            Err(_) => Err(RefreshError::Timeout(timeout.as_millis() as u64)),
        }
    }

    /// Log the failed attempt as a run of its own. Its start time becomes the
    /// type's latest run, so the next pass does not retrigger right away.
    async fn record_failed_attempt(&self, spec: &SyncTypeSpec, error: &str) {
        let message = format!("{GUARD_RECOVERY_PREFIX}: {error}");
        let handle = self.ledger.start(&spec.name).await;
        self.ledger
            .finalize(
                handle.as_ref(),
                false,
                Some(message.as_str()),
                serde_json::json!({ "source": "freshness-guard", "trigger": self.trigger.trigger_name() }),
            )
            .await;
    }

    async fn emit_self_healed(&self, spec: &SyncTypeSpec, stale_mins: Option<f64>, status: &str) {
        let event = TelemetryEvent::new(SELF_HEALED_EVENT)
            .with_property("sync_type", spec.name.as_str())
            .with_property("stale_mins", stale_mins.map(|m| m.round()))
            .with_property("threshold_mins", spec.guard_threshold_mins)
            .with_property("status", status);
        self.telemetry.emit(&event).await;
    }

    async fn alert(&self, kind: AlertKind, ctx: &AlertContext) {
        match self.renderer.render_alert(kind, ctx) {
            Ok(alert) => {
                self.dispatcher.dispatch(&alert).await;
            }
            Err(e) => warn!(kind = kind.as_str(), error = %e, "failed to render guard alert"),
        }
    }

    /// Alert once per type entering a genuine-failure state; forget types
    /// that recovered. Returns the types alerted this pass.
    async fn escalate_failures(&self, snapshots: &[HealthSnapshot]) -> Vec<String> {
        let failing: Vec<&HealthSnapshot> =
            snapshots.iter().filter(|s| is_genuine_failure(s)).collect();

        let newly_failing: Vec<&HealthSnapshot> = {
            let mut escalated = self.escalated.lock().await;
            escalated.retain(|t| failing.iter().any(|s| &s.sync_type == t));
            failing
                .into_iter()
                .filter(|s| escalated.insert(s.sync_type.clone()))
                .collect()
        };

        let mut alerted = Vec::with_capacity(newly_failing.len());
        for snap in newly_failing {
            warn!(
                sync_type = %snap.sync_type,
                error = snap.last_error.as_deref().unwrap_or(""),
                "sync type failing, escalating"
            );
            let mut ctx = AlertContext::new(
                &snap.sync_type,
                self.registry.health_threshold(&snap.sync_type),
            );
            ctx.error = snap.last_error.clone();
            self.alert(AlertKind::SyncFailed, &ctx).await;
            alerted.push(snap.sync_type.clone());
        }
        alerted
    }
}
