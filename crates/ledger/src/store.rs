//! Storage seam for the Sync Run Ledger.

use chrono::{DateTime, Utc};

use crate::error::LedgerError;
use crate::types::{CompletedRun, HealthSnapshot, RunCompletion, SyncRun};

/// CRUD operations over `sync_log`.
///
/// Implementations do no locking of their own: two runs of the same sync
/// type never touch the same row because each job holds an external
/// concurrency slot.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a started run (`success = false`, nothing finalized) and
    /// return its id.
    async fn insert_run(
        &self,
        sync_type: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64, LedgerError>;

    /// Finalize a run. Returns `false` when the run had already been
    /// finalized, so a second call is a no-op.
    async fn finalize_run(&self, id: i64, completion: &RunCompletion) -> Result<bool, LedgerError>;

    /// Insert already-completed runs; returns the number of rows written.
    async fn insert_completed(&self, runs: &[CompletedRun]) -> Result<u64, LedgerError>;

    async fn get_run(&self, id: i64) -> Result<Option<SyncRun>, LedgerError>;

    /// Latest run per sync type, with success/failure counts over runs
    /// started at or after `counts_since`.
    async fn latest_snapshots(
        &self,
        counts_since: DateTime<Utc>,
    ) -> Result<Vec<HealthSnapshot>, LedgerError>;

    /// Runs that started before `started_before` and were never finalized.
    async fn find_ghosts(&self, started_before: DateTime<Utc>) -> Result<Vec<SyncRun>, LedgerError>;

    /// Whether a finished, failed run of `sync_type` started at or after `since`.
    async fn has_recent_failure(
        &self,
        sync_type: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, LedgerError>;

    /// Human-readable backend name for logs.
    fn backend_name(&self) -> &str;
}
