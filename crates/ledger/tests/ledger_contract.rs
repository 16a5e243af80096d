//! Write-contract tests for `SyncLedger` over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use drep_ledger::{
    CompletedRun, HealthSnapshot, LedgerError, LedgerStore, MemoryLedgerStore, RunCompletion,
    SyncLedger, SyncRun, MAX_ERROR_LEN,
};

fn ledger_over(store: Arc<MemoryLedgerStore>) -> SyncLedger {
    SyncLedger::new(store, Duration::from_secs(5))
}

#[tokio::test]
async fn start_then_finalize_records_outcome() {
    let store = Arc::new(MemoryLedgerStore::new());
    let ledger = ledger_over(store.clone());

    let handle = ledger.start("proposals").await.expect("store is up");
    let run = store.get_run(handle.id).await.unwrap().unwrap();
    assert!(!run.success);
    assert!(run.finished_at.is_none());
    assert!(run.duration_ms.is_none());
    assert!(run.error_message.is_none());

    ledger
        .finalize(Some(&handle), true, None, serde_json::json!({"fetched": 12}))
        .await;

    let run = store.get_run(handle.id).await.unwrap().unwrap();
    assert!(run.success);
    assert!(run.finished_at.is_some());
    assert!(run.duration_ms.unwrap() >= 0);
    assert_eq!(run.metrics["fetched"], 12);
}

#[tokio::test]
async fn unreachable_store_is_not_fatal() {
    let store = Arc::new(MemoryLedgerStore::new());
    store.set_unavailable(true);
    let ledger = ledger_over(store.clone());

    let handle = ledger.start("votes").await;
    assert!(handle.is_none());
    // Finalizing without a handle is a no-op.
    ledger.finalize(handle.as_ref(), true, None, serde_json::json!({})).await;

    let result: Result<u32, String> = ledger
        .track("votes", async { Ok((7, serde_json::json!({}))) })
        .await;
    assert_eq!(result, Ok(7));
}

#[tokio::test]
async fn finalize_failure_after_start_is_swallowed() {
    let store = Arc::new(MemoryLedgerStore::new());
    let ledger = ledger_over(store.clone());

    let handle = ledger.start("dreps").await.unwrap();
    store.set_unavailable(true);
    ledger
        .finalize(Some(&handle), false, Some("boom"), serde_json::json!({}))
        .await;
    store.set_unavailable(false);

    let run = store.get_run(handle.id).await.unwrap().unwrap();
    assert!(run.finished_at.is_none());
}

#[tokio::test]
async fn track_records_error_text_truncated() {
    let store = Arc::new(MemoryLedgerStore::new());
    let ledger = ledger_over(store.clone());

    let huge = "stack frame\n".repeat(1_000);
    let result: Result<(), String> = ledger
        .track("secondary", async { Err(huge.clone()) })
        .await;
    assert!(result.is_err());

    let runs = store.runs().await;
    assert_eq!(runs.len(), 1);
    let message = runs[0].error_message.as_deref().unwrap();
    assert!(message.contains("[truncated]"));
    assert!(message.chars().count() < MAX_ERROR_LEN + 20);
    assert!(!runs[0].success);
}

#[tokio::test]
async fn backfill_writes_all_pages() {
    let store = Arc::new(MemoryLedgerStore::new());
    let ledger = ledger_over(store.clone());
    let now = Utc::now();

    let runs: Vec<CompletedRun> = (0..25)
        .map(|i| CompletedRun {
            sync_type: "slow".into(),
            started_at: now - chrono::Duration::hours(i + 1),
            finished_at: now - chrono::Duration::hours(i + 1) + chrono::Duration::minutes(3),
            success: i % 5 != 0,
            error_message: (i % 5 == 0).then(|| "upstream 502".to_string()),
            metrics: serde_json::json!({}),
        })
        .collect();

    let report = ledger.backfill(&runs, 10).await;
    assert_eq!(report.pages, 3);
    assert_eq!(report.written, 25);
    assert!(report.is_complete());
    assert_eq!(store.runs().await.len(), 25);
}

#[tokio::test]
async fn backfill_against_down_store_counts_failures() {
    let store = Arc::new(MemoryLedgerStore::new());
    store.set_unavailable(true);
    let ledger = ledger_over(store.clone());
    let now = Utc::now();

    let runs: Vec<CompletedRun> = (0..4)
        .map(|_| CompletedRun {
            sync_type: "votes".into(),
            started_at: now,
            finished_at: now,
            success: true,
            error_message: None,
            metrics: serde_json::Value::Null,
        })
        .collect();

    let report = ledger.backfill(&runs, 3).await;
    assert_eq!(report.pages, 2);
    assert_eq!(report.written, 0);
    assert_eq!(report.failed, 4);
    assert_eq!(report.page_errors.len(), 2);
}

/// A store whose writes never complete in time.
struct StalledStore;

#[async_trait::async_trait]
impl LedgerStore for StalledStore {
    async fn insert_run(&self, _: &str, _: DateTime<Utc>) -> Result<i64, LedgerError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(1)
    }
    async fn finalize_run(&self, _: i64, _: &RunCompletion) -> Result<bool, LedgerError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(true)
    }
    async fn insert_completed(&self, _: &[CompletedRun]) -> Result<u64, LedgerError> {
        Ok(0)
    }
    async fn get_run(&self, _: i64) -> Result<Option<SyncRun>, LedgerError> {
        Ok(None)
    }
    async fn latest_snapshots(&self, _: DateTime<Utc>) -> Result<Vec<HealthSnapshot>, LedgerError> {
        Ok(Vec::new())
    }
    async fn find_ghosts(&self, _: DateTime<Utc>) -> Result<Vec<SyncRun>, LedgerError> {
        Ok(Vec::new())
    }
    async fn has_recent_failure(&self, _: &str, _: DateTime<Utc>) -> Result<bool, LedgerError> {
        Ok(false)
    }
    fn backend_name(&self) -> &str {
        "stalled"
    }
}

#[tokio::test]
async fn stalled_store_is_bounded_by_timeout() {
    let ledger = SyncLedger::new(Arc::new(StalledStore), Duration::from_millis(50));
    let started = std::time::Instant::now();
    assert!(ledger.start("proposals").await.is_none());
    assert!(started.elapsed() < Duration::from_secs(5));
}
