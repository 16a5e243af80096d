//! Background freshness guard loop.
//!
//! Spawned as a tokio task at startup. Runs one guard pass per
//! `GUARD_INTERVAL_MINS`; ticks missed while a pass is still running are
//! skipped rather than replayed.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::state::AppState;

pub async fn run_guard_loop(state: Arc<AppState>) {
    let period = Duration::from_secs(state.config.guard.interval_mins.max(1) * 60);
    info!(
        "Freshness guard active: checking {} sync types every {}m",
        state.classifier.registry().len(),
        period.as_secs() / 60
    );

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let report = state.guard.run_once().await;
        if !report.failed.is_empty() {
            warn!(
                failed = ?report.failed.iter().map(|f| f.sync_type.as_str()).collect::<Vec<_>>(),
                "Guard pass left types unrecovered"
            );
        }

        let evicted = state.guard_limiter.evict_expired();
        if evicted > 0 {
            debug!(evicted, "Evicted expired rate-limit windows");
        }
    }
}
