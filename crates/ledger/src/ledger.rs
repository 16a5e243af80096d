//! [`SyncLedger`]: the write contract refresh jobs use.
//!
//! Every call is bounded by a timeout and never fails the calling job. A
//! store error is logged as a warning; `start` then returns `None` and the
//! job runs without a ledger row.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::batch::{write_paged, BatchReport};
use crate::error::LedgerError;
use crate::store::LedgerStore;
use crate::types::{CompletedRun, RunCompletion};

/// Longest error message kept on a run, in characters.
pub const MAX_ERROR_LEN: usize = 2_000;
const TRUNCATION_MARKER: &str = "… [truncated]";

/// Cap `message` at [`MAX_ERROR_LEN`] characters, appending a marker when cut.
pub fn truncate_error(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_LEN) {
        Some((byte_idx, _)) => format!("{}{}", &message[..byte_idx], TRUNCATION_MARKER),
        None => message.to_string(),
    }
}

/// Opaque reference to a started run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub id: i64,
    pub sync_type: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SyncLedger {
    store: Arc<dyn LedgerStore>,
    timeout: Duration,
}

impl SyncLedger {
    pub fn new(store: Arc<dyn LedgerStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Await `fut`, failing with [`LedgerError::Timeout`] past the ledger timeout.
    pub async fn bounded<T, F>(&self, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    /// Record that a `sync_type` job has started.
    pub async fn start(&self, sync_type: &str) -> Option<RunHandle> {
        let started_at = Utc::now();
        match self.bounded(self.store.insert_run(sync_type, started_at)).await {
            Ok(id) => {
                debug!(sync_type, run_id = id, "sync run started");
                Some(RunHandle {
                    id,
                    sync_type: sync_type.to_string(),
                    started_at,
                })
            }
            Err(e) => {
                warn!(sync_type, error = %e, "failed to record sync run start, continuing without ledger row");
                None
            }
        }
    }

    /// Record the outcome of a started run. Safe to call with `None`.
    pub async fn finalize(
        &self,
        handle: Option<&RunHandle>,
        success: bool,
        error_message: Option<&str>,
        metrics: serde_json::Value,
    ) {
        let Some(handle) = handle else {
            return;
        };

        let finished_at = Utc::now();
        let completion = RunCompletion {
            finished_at,
            duration_ms: finished_at
                .signed_duration_since(handle.started_at)
                .num_milliseconds()
                .max(0),
            success,
            error_message: error_message.map(truncate_error),
            metrics,
        };

        match self.bounded(self.store.finalize_run(handle.id, &completion)).await {
            Ok(true) => debug!(
                sync_type = %handle.sync_type,
                run_id = handle.id,
                success,
                duration_ms = completion.duration_ms,
                "sync run finalized"
            ),
            Ok(false) => warn!(
                sync_type = %handle.sync_type,
                run_id = handle.id,
                "sync run was already finalized"
            ),
            Err(e) => warn!(
                sync_type = %handle.sync_type,
                run_id = handle.id,
                error = %e,
                "failed to finalize sync run"
            ),
        }
    }

    /// Run `job` between `start` and `finalize`.
    ///
    /// The job returns its value plus a metrics payload; on error the
    /// error's `Display` text is recorded and the error is handed back.
    pub async fn track<T, E, F>(&self, sync_type: &str, job: F) -> Result<T, E>
    where
        F: Future<Output = Result<(T, serde_json::Value), E>>,
        E: Display,
    {
        let handle = self.start(sync_type).await;
        match job.await {
            Ok((value, metrics)) => {
                self.finalize(handle.as_ref(), true, None, metrics).await;
                Ok(value)
            }
            Err(e) => {
                let message = e.to_string();
                self.finalize(handle.as_ref(), false, Some(&message), serde_json::json!({}))
                    .await;
                Err(e)
            }
        }
    }

    /// Bulk-import completed runs page by page.
    pub async fn backfill(&self, runs: &[CompletedRun], page_size: usize) -> BatchReport {
        let store = Arc::clone(&self.store);
        let timeout = self.timeout;
        write_paged(runs, page_size, |_, page| {
            let store = Arc::clone(&store);
            let page = page.to_vec();
            async move {
                match tokio::time::timeout(timeout, store.insert_completed(&page)).await {
                    Ok(result) => result,
                    Err(_) => Err(LedgerError::Timeout(timeout.as_millis() as u64)),
                }
            }
        })
        .await
    }
}
