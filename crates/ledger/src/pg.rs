//! PostgreSQL-backed [`LedgerStore`].

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::error::LedgerError;
use crate::store::LedgerStore;
use crate::types::{CompletedRun, HealthSnapshot, RunCompletion, SyncRun};

const RUN_COLUMNS: &str =
    "id, sync_type, started_at, finished_at, duration_ms, success, error_message, metrics";

/// `sync_log` over a shared connection pool.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Connect and apply pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect(url)
            .await?;
        sqlx::migrate!("../../migrations").run(&pool).await?;
        info!("sync_log migrations applied");
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl LedgerStore for PgLedgerStore {
    async fn insert_run(
        &self,
        sync_type: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64, LedgerError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO sync_log (sync_type, started_at, success)
             VALUES ($1, $2, false)
             RETURNING id",
        )
        .bind(sync_type)
        .bind(started_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn finalize_run(&self, id: i64, completion: &RunCompletion) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            "UPDATE sync_log
             SET finished_at = $2, duration_ms = $3, success = $4,
                 error_message = $5, metrics = $6
             WHERE id = $1 AND finished_at IS NULL AND duration_ms IS NULL",
        )
        .bind(id)
        .bind(completion.finished_at)
        .bind(completion.duration_ms)
        .bind(completion.success)
        .bind(&completion.error_message)
        .bind(&completion.metrics)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM sync_log WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(LedgerError::NotFound(id)),
        }
    }

    async fn insert_completed(&self, runs: &[CompletedRun]) -> Result<u64, LedgerError> {
        if runs.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for run in runs {
            sqlx::query(
                "INSERT INTO sync_log
                    (sync_type, started_at, finished_at, duration_ms, success, error_message, metrics)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&run.sync_type)
            .bind(run.started_at)
            .bind(run.finished_at)
            .bind(run.duration_ms())
            .bind(run.success)
            .bind(&run.error_message)
            .bind(&run.metrics)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(runs.len() as u64)
    }

    async fn get_run(&self, id: i64) -> Result<Option<SyncRun>, LedgerError> {
        let row = sqlx::query_as::<_, SyncRun>(&format!(
            "SELECT {RUN_COLUMNS} FROM sync_log WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn latest_snapshots(
        &self,
        counts_since: DateTime<Utc>,
    ) -> Result<Vec<HealthSnapshot>, LedgerError> {
        let rows = sqlx::query_as::<_, HealthSnapshot>(
            "WITH latest AS (
                 SELECT DISTINCT ON (sync_type)
                        sync_type, started_at, finished_at, duration_ms, success, error_message
                 FROM sync_log
                 ORDER BY sync_type, started_at DESC, id DESC
             ),
             counts AS (
                 SELECT sync_type,
                        COUNT(*) FILTER (WHERE success) AS success_count,
                        COUNT(*) FILTER (WHERE NOT success AND finished_at IS NOT NULL) AS failure_count
                 FROM sync_log
                 WHERE started_at >= $1
                 GROUP BY sync_type
             ),
             successes AS (
                 SELECT sync_type, MAX(finished_at) AS last_success_at
                 FROM sync_log
                 WHERE success
                 GROUP BY sync_type
             )
             SELECT l.sync_type,
                    l.started_at    AS last_run,
                    l.finished_at   AS last_finished,
                    l.duration_ms   AS last_duration_ms,
                    l.success       AS last_success,
                    l.error_message AS last_error,
                    s.last_success_at,
                    COALESCE(c.success_count, 0) AS success_count,
                    COALESCE(c.failure_count, 0) AS failure_count
             FROM latest l
             LEFT JOIN counts c USING (sync_type)
             LEFT JOIN successes s USING (sync_type)
             ORDER BY l.sync_type",
        )
        .bind(counts_since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_ghosts(&self, started_before: DateTime<Utc>) -> Result<Vec<SyncRun>, LedgerError> {
        let rows = sqlx::query_as::<_, SyncRun>(&format!(
            "SELECT {RUN_COLUMNS} FROM sync_log
             WHERE success = false
               AND error_message IS NULL
               AND duration_ms IS NULL
               AND started_at < $1
             ORDER BY started_at"
        ))
        .bind(started_before)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn has_recent_failure(
        &self,
        sync_type: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM sync_log
                 WHERE sync_type = $1
                   AND success = false
                   AND finished_at IS NOT NULL
                   AND started_at >= $2
             )",
        )
        .bind(sync_type)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    fn backend_name(&self) -> &str {
        "postgres"
    }
}
