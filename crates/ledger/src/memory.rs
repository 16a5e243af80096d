//! In-process [`LedgerStore`] used when PostgreSQL is not configured.
//!
//! Mirrors the SQL semantics of [`PgLedgerStore`](crate::PgLedgerStore)
//! row for row. [`set_unavailable`](MemoryLedgerStore::set_unavailable)
//! makes every call fail, standing in for an unreachable database.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::LedgerError;
use crate::store::LedgerStore;
use crate::types::{CompletedRun, HealthSnapshot, RunCompletion, SyncRun};

#[derive(Default)]
struct Inner {
    next_id: i64,
    runs: Vec<SyncRun>,
}

#[derive(Default)]
pub struct MemoryLedgerStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of every stored run, in insertion order.
    pub async fn runs(&self) -> Vec<SyncRun> {
        self.inner.lock().await.runs.clone()
    }

    fn check(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_run(
        &self,
        sync_type: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64, LedgerError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.runs.push(SyncRun {
            id,
            sync_type: sync_type.to_string(),
            started_at,
            finished_at: None,
            duration_ms: None,
            success: false,
            error_message: None,
            metrics: serde_json::json!({}),
        });
        Ok(id)
    }

    async fn finalize_run(&self, id: i64, completion: &RunCompletion) -> Result<bool, LedgerError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        let run = inner
            .runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(LedgerError::NotFound(id))?;

        if run.finished_at.is_some() || run.duration_ms.is_some() {
            return Ok(false);
        }

        run.finished_at = Some(completion.finished_at);
        run.duration_ms = Some(completion.duration_ms);
        run.success = completion.success;
        run.error_message = completion.error_message.clone();
        run.metrics = completion.metrics.clone();
        Ok(true)
    }

    async fn insert_completed(&self, runs: &[CompletedRun]) -> Result<u64, LedgerError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        for run in runs {
            inner.next_id += 1;
            let id = inner.next_id;
            inner.runs.push(SyncRun {
                id,
                sync_type: run.sync_type.clone(),
                started_at: run.started_at,
                finished_at: Some(run.finished_at),
                duration_ms: Some(run.duration_ms()),
                success: run.success,
                error_message: run.error_message.clone(),
                metrics: run.metrics.clone(),
            });
        }
        Ok(runs.len() as u64)
    }

    async fn get_run(&self, id: i64) -> Result<Option<SyncRun>, LedgerError> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner.runs.iter().find(|r| r.id == id).cloned())
    }

    async fn latest_snapshots(
        &self,
        counts_since: DateTime<Utc>,
    ) -> Result<Vec<HealthSnapshot>, LedgerError> {
        self.check()?;
        let inner = self.inner.lock().await;

        let mut latest: BTreeMap<&str, &SyncRun> = BTreeMap::new();
        let mut counts: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
        let mut last_success: BTreeMap<&str, DateTime<Utc>> = BTreeMap::new();

        for run in &inner.runs {
            let newer = match latest.get(run.sync_type.as_str()) {
                Some(cur) => (run.started_at, run.id) > (cur.started_at, cur.id),
                None => true,
            };
            if newer {
                latest.insert(run.sync_type.as_str(), run);
            }

            if let (true, Some(finished)) = (run.success, run.finished_at) {
                let entry = last_success.entry(run.sync_type.as_str()).or_insert(finished);
                if finished > *entry {
                    *entry = finished;
                }
            }

            if run.started_at >= counts_since {
                let entry = counts.entry(run.sync_type.as_str()).or_default();
                if run.success {
                    entry.0 += 1;
                } else if run.finished_at.is_some() {
                    entry.1 += 1;
                }
            }
        }

        Ok(latest
            .into_iter()
            .map(|(sync_type, run)| {
                let (success_count, failure_count) =
                    counts.get(sync_type).copied().unwrap_or_default();
                HealthSnapshot {
                    sync_type: sync_type.to_string(),
                    last_run: run.started_at,
                    last_finished: run.finished_at,
                    last_duration_ms: run.duration_ms,
                    last_success: run.success,
                    last_error: run.error_message.clone(),
                    last_success_at: last_success.get(sync_type).copied(),
                    success_count,
                    failure_count,
                }
            })
            .collect())
    }

    async fn find_ghosts(&self, started_before: DateTime<Utc>) -> Result<Vec<SyncRun>, LedgerError> {
        self.check()?;
        let inner = self.inner.lock().await;
        let mut ghosts: Vec<SyncRun> = inner
            .runs
            .iter()
            .filter(|r| r.is_ghost(started_before))
            .cloned()
            .collect();
        ghosts.sort_by_key(|r| r.started_at);
        Ok(ghosts)
    }

    async fn has_recent_failure(
        &self,
        sync_type: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner.runs.iter().any(|r| {
            r.sync_type == sync_type && !r.success && r.finished_at.is_some() && r.started_at >= since
        }))
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
