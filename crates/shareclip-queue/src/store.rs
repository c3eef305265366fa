//! Durable job store backed by SQLite.
//!
//! The pool holds exactly one connection, so every statement and every
//! transaction is serialized. A claim's read of the oldest QUEUED row and its
//! write to PROCESSING run in one transaction on that connection and cannot
//! interleave with another worker's claim.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use shareclip_models::{Job, JobId, JobStatus};

use crate::error::{StoreError, StoreResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    id          TEXT PRIMARY KEY NOT NULL,
    owner_id    TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    status      TEXT NOT NULL
)
"#;

const STATUS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_videos_status_created ON videos (status, created_at)";

const OWNER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_videos_owner_created ON videos (owner_id, created_at)";

/// Persistence operations needed by the worker pool and its collaborators.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new QUEUED job.
    async fn enqueue(&self, id: &JobId, owner_id: &str) -> StoreResult<Job>;

    /// Oldest QUEUED job, without changing it.
    async fn next_queued(&self) -> StoreResult<Option<Job>>;

    /// Atomically take the oldest QUEUED job and mark it PROCESSING.
    async fn claim_next_queued(&self) -> StoreResult<Option<Job>>;

    /// Overwrite a job's status.
    async fn set_status(&self, id: &JobId, status: JobStatus) -> StoreResult<()>;

    async fn find_by_id(&self, id: &JobId) -> StoreResult<Option<Job>>;

    /// All jobs in `status`, oldest first.
    async fn find_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>>;

    /// All jobs owned by `owner_id`, newest first.
    async fn find_by_owner(&self, owner_id: &str) -> StoreResult<Vec<Job>>;
}

/// SQLite implementation of [`JobStore`].
#[derive(Debug, Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    /// Open (creating if needed) the database at `url`.
    ///
    /// Accepts `sqlite://path/to/file.db` and `sqlite::memory:`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::connection_failed(format!("{}: {}", url, e)))?
            .create_if_missing(true);

        // One long-lived connection; an in-memory database lives only as long as it does
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::connection_failed(format!("{}: {}", url, e)))?;

        info!("Connected to job store at {}", url);
        Ok(Self { pool })
    }

    /// Create the jobs table and indexes when missing.
    pub async fn init_schema(&self) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for statement in [SCHEMA, STATUS_INDEX, OWNER_INDEX] {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        debug!("Job store schema ready");
        Ok(())
    }

    /// Close the pool, waiting for the connection to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn job_from_row(row: &SqliteRow) -> StoreResult<Job> {
    let id: String = row.try_get("id")?;
    let owner_id: String = row.try_get("owner_id")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let status: String = row.try_get("status")?;

    Ok(Job {
        id: JobId::from_string(id),
        owner_id,
        created_at,
        status: JobStatus::from_str(&status)?,
    })
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn enqueue(&self, id: &JobId, owner_id: &str) -> StoreResult<Job> {
        let job = Job::queued(id.clone(), owner_id);

        sqlx::query("INSERT INTO videos (id, owner_id, created_at, status) VALUES (?, ?, ?, ?)")
            .bind(job.id.as_str())
            .bind(&job.owner_id)
            .bind(job.created_at)
            .bind(job.status.as_str())
            .execute(&self.pool)
            .await?;

        debug!(job_id = %job.id, owner_id = %job.owner_id, "Job enqueued");
        Ok(job)
    }

    async fn next_queued(&self) -> StoreResult<Option<Job>> {
        let row = sqlx::query(
            "SELECT id, owner_id, created_at, status FROM videos \
             WHERE status = ? ORDER BY created_at, rowid LIMIT 1",
        )
        .bind(JobStatus::Queued.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn claim_next_queued(&self) -> StoreResult<Option<Job>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT id, owner_id, created_at, status FROM videos \
             WHERE status = ? ORDER BY created_at, rowid LIMIT 1",
        )
        .bind(JobStatus::Queued.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let mut job = job_from_row(&row)?;

        let updated = sqlx::query("UPDATE videos SET status = ? WHERE id = ? AND status = ?")
            .bind(JobStatus::Processing.as_str())
            .bind(job.id.as_str())
            .bind(JobStatus::Queued.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        job.status = JobStatus::Processing;
        debug!(job_id = %job.id, "Job claimed");
        Ok(Some(job))
    }

    async fn set_status(&self, id: &JobId, status: JobStatus) -> StoreResult<()> {
        let updated = sqlx::query("UPDATE videos SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::JobNotFound(id.clone()));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> StoreResult<Option<Job>> {
        let row = sqlx::query("SELECT id, owner_id, created_at, status FROM videos WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn find_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, created_at, status FROM videos \
             WHERE status = ? ORDER BY created_at, rowid",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn find_by_owner(&self, owner_id: &str) -> StoreResult<Vec<Job>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, created_at, status FROM videos \
             WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn memory_store() -> SqliteJobStore {
        let store = SqliteJobStore::connect("sqlite::memory:").await.unwrap();
        store.init_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_enqueue_and_find() {
        let store = memory_store().await;
        let id = JobId::generate();

        let job = store.enqueue(&id, "user-1").await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        let found = store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.owner_id, "user-1");
        assert_eq!(found.status, JobStatus::Queued);
        assert_eq!(found.created_at, job.created_at);

        assert!(store.find_by_id(&JobId::generate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = memory_store().await;
        let id = JobId::generate();

        store.enqueue(&id, "user-1").await.unwrap();
        assert!(matches!(
            store.enqueue(&id, "user-2").await,
            Err(StoreError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_claim_takes_oldest_first() {
        let store = memory_store().await;
        let first = JobId::from_string("aaaaaaaaaaa");
        let second = JobId::from_string("bbbbbbbbbbb");
        store.enqueue(&first, "u").await.unwrap();
        store.enqueue(&second, "u").await.unwrap();

        assert_eq!(store.next_queued().await.unwrap().unwrap().id, first);
        // Peeking does not change anything
        assert_eq!(store.next_queued().await.unwrap().unwrap().id, first);

        let claimed = store.claim_next_queued().await.unwrap().unwrap();
        assert_eq!(claimed.id, first);
        assert_eq!(claimed.status, JobStatus::Processing);
        assert_eq!(
            store.find_by_id(&first).await.unwrap().unwrap().status,
            JobStatus::Processing
        );

        assert_eq!(store.claim_next_queued().await.unwrap().unwrap().id, second);
        assert!(store.claim_next_queued().await.unwrap().is_none());
        assert!(store.next_queued().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_share_a_job() {
        let store = Arc::new(memory_store().await);
        for _ in 0..20 {
            store.enqueue(&JobId::generate(), "u").await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(job) = store.claim_next_queued().await.unwrap() {
                    claimed.push(job.id);
                }
                claimed
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        let total = all.len();
        all.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        all.dedup();
        assert_eq!(total, 20);
        assert_eq!(all.len(), 20);
    }

    #[tokio::test]
    async fn test_set_status_and_find_by_status() {
        let store = memory_store().await;
        let a = JobId::generate();
        let b = JobId::generate();
        store.enqueue(&a, "u").await.unwrap();
        store.enqueue(&b, "u").await.unwrap();

        store.set_status(&a, JobStatus::Processing).await.unwrap();
        store.set_status(&b, JobStatus::Processing).await.unwrap();
        store.set_status(&b, JobStatus::Finished).await.unwrap();

        let processing = store.find_by_status(JobStatus::Processing).await.unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, a);

        assert!(matches!(
            store.set_status(&JobId::generate(), JobStatus::Error).await,
            Err(StoreError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_by_owner_newest_first() {
        let store = memory_store().await;
        let older = JobId::from_string("olderolder1");
        let newer = JobId::from_string("newernewer1");
        store.enqueue(&older, "alice").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.enqueue(&newer, "alice").await.unwrap();
        store.enqueue(&JobId::generate(), "bob").await.unwrap();

        let jobs = store.find_by_owner("alice").await.unwrap();
        let ids: Vec<_> = jobs.iter().map(|j| j.id.clone()).collect();
        assert_eq!(ids, vec![newer, older]);
        assert!(store.find_by_owner("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_status_is_reported() {
        let store = memory_store().await;
        sqlx::query("INSERT INTO videos (id, owner_id, created_at, status) VALUES (?, ?, ?, ?)")
            .bind("broken00000")
            .bind("u")
            .bind(Utc::now())
            .bind("PAUSED")
            .execute(&store.pool)
            .await
            .unwrap();

        let err = store
            .find_by_id(&JobId::from_string("broken00000"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MalformedRow(_)));
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("database.db").display());
        let id = JobId::generate();

        let store = SqliteJobStore::connect(&url).await.unwrap();
        store.init_schema().await.unwrap();
        store.enqueue(&id, "u").await.unwrap();
        store.set_status(&id, JobStatus::Processing).await.unwrap();
        store.close().await;

        let reopened = SqliteJobStore::connect(&url).await.unwrap();
        reopened.init_schema().await.unwrap();
        let job = reopened.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
    }
}
