//! Sync health and self-healing.
//!
//! - [`SyncRegistry`]: the refresh jobs being watched and their thresholds
//! - [`HealthClassifier`]: healthy / degraded / critical per type, plus a
//!   worst-case rollup
//! - [`RefreshTrigger`]: how a stale job is re-run
//! - [`FreshnessGuard`]: ghost repair, staleness recovery, failure escalation

pub mod guard;
pub mod health;
pub mod refresh;
pub mod registry;

pub use guard::{
    FailedRecovery, FreshnessGuard, GuardReport, GuardSettings, RecoveredType,
    GUARD_RECOVERY_PREFIX, SELF_HEALED_EVENT,
};
pub use health::{HealthClassifier, HealthReport, Level, OverallStatus, TypeHealth};
pub use refresh::{HttpRefreshTrigger, RefreshError, RefreshOutcome, RefreshTrigger, UnconfiguredTrigger};
pub use registry::{SyncRegistry, SyncTypeSpec, DEFAULT_THRESHOLD_MINS};
