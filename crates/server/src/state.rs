use std::sync::Arc;
use std::time::Duration;

use drep_core::{Config, EpochClock};
use drep_ledger::{LedgerStore, SyncLedger};
use drep_notify::{Dispatcher, Telemetry};
use drep_sync::{
    FreshnessGuard, GuardSettings, HealthClassifier, HttpRefreshTrigger, RefreshTrigger,
    SyncRegistry, UnconfiguredTrigger,
};
use tracing::warn;

use crate::rate_limit::KeyedRateLimiter;

pub struct AppState {
    pub config: Config,
    pub ledger: SyncLedger,
    pub classifier: HealthClassifier,
    pub guard: Arc<FreshnessGuard>,
    pub epoch: EpochClock,
    /// Limits manual `POST /api/guard/run` calls per client.
    pub guard_limiter: KeyedRateLimiter,
}

impl AppState {
    /// Wire every component over an already-opened ledger store.
    pub fn build(config: Config, store: Arc<dyn LedgerStore>) -> Self {
        let settings = GuardSettings::from(&config.guard);
        let registry = Arc::new(SyncRegistry::standard());
        let ledger = SyncLedger::new(store, settings.store_timeout);

        let trigger: Arc<dyn RefreshTrigger> = match config.refresh.base_url.as_deref() {
            Some(url) => match HttpRefreshTrigger::new(url, config.refresh.secret.clone()) {
                Ok(t) => Arc::new(t),
                Err(e) => {
                    warn!(error = %e, "Refresh trigger disabled");
                    Arc::new(UnconfiguredTrigger)
                }
            },
            None => {
                warn!("REFRESH_BASE_URL not set; guard recoveries will fail and alert");
                Arc::new(UnconfiguredTrigger)
            }
        };

        let dispatcher = Arc::new(Dispatcher::from_config(&config.alerts));
        let telemetry = Arc::new(Telemetry::from_config(
            &config.telemetry,
            Duration::from_secs(config.alerts.timeout_secs.max(1)),
        ));

        Self::with_parts(config, ledger, registry, trigger, dispatcher, telemetry)
    }

    pub fn with_parts(
        config: Config,
        ledger: SyncLedger,
        registry: Arc<SyncRegistry>,
        trigger: Arc<dyn RefreshTrigger>,
        dispatcher: Arc<Dispatcher>,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        let settings = GuardSettings::from(&config.guard);
        let classifier = HealthClassifier::new(Arc::clone(&registry), settings.ghost_threshold);
        let guard = Arc::new(FreshnessGuard::new(
            ledger.clone(),
            registry,
            trigger,
            dispatcher,
            telemetry,
            settings,
        ));
        let guard_limiter = KeyedRateLimiter::new(
            config.server.guard_run_limit,
            Duration::from_secs(config.server.guard_run_window_secs),
        );

        Self {
            epoch: config.epoch.clock(),
            config,
            ledger,
            classifier,
            guard,
            guard_limiter,
        }
    }

    pub fn store_timeout(&self) -> Duration {
        self.guard.settings().store_timeout
    }
}
