//! SQLite-backed job and chunk store.
//!
//! All state transitions the pipeline depends on go through here as small
//! single-statement transactions, so concurrent readers (status polling,
//! janitor) always see committed progress. `updated_at` is touched on
//! every job mutation — the stale-job sweep keys off it.
//!
//! Queries are built at runtime (no compile-time database), with explicit
//! row mapping into the domain types from [`crate::job`].

use chrono::{Duration, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::config::SttProvider;
use crate::error::{CoreError, Result};
use crate::job::{ChunkRecord, ChunkStatus, JobConfig, JobRecord, JobStatus};
use crate::provider::TranscriptionResponse;

const JOBS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id               TEXT PRIMARY KEY,
    status           TEXT NOT NULL,
    config           TEXT NOT NULL,
    provider         TEXT NOT NULL,
    original_filename TEXT,
    file_size_bytes  INTEGER,
    duration_seconds REAL,
    audio_format     TEXT,
    original_key     TEXT,
    result_key       TEXT,
    result_summary   TEXT,
    error_message    TEXT,
    error_code       TEXT,
    total_chunks     INTEGER NOT NULL DEFAULT 0,
    completed_chunks INTEGER NOT NULL DEFAULT 0,
    webhook_url      TEXT,
    webhook_sent     INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    completed_at     TEXT
);
CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs (status);
CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs (created_at);
CREATE INDEX IF NOT EXISTS idx_jobs_provider ON jobs (provider);

CREATE TABLE IF NOT EXISTS chunks (
    id            TEXT PRIMARY KEY,
    job_id        TEXT NOT NULL REFERENCES jobs (id) ON DELETE CASCADE,
    chunk_index   INTEGER NOT NULL,
    status        TEXT NOT NULL,
    start_time    REAL NOT NULL,
    end_time      REAL NOT NULL,
    attempt_count INTEGER NOT NULL DEFAULT 0,
    last_error    TEXT,
    result        TEXT,
    created_at    TEXT NOT NULL,
    processed_at  TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_chunks_job_index ON chunks (job_id, chunk_index);
CREATE INDEX IF NOT EXISTS idx_chunks_job_status ON chunks (job_id, status);
"#;

/// Durable state for jobs and chunks.
#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    /// Open (creating the schema if needed) at the configured URL.
    pub async fn connect(url: &str) -> Result<Self> {
        // A memory database exists per connection; cap the pool at one so
        // every query sees the same data.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Shared connection pool, for the queue living in the same database.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<()> {
        for statement in JOBS_DDL.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // -- jobs ------------------------------------------------------------

    /// Create a job in `pending`.
    pub async fn create_job(
        &self,
        config: &JobConfig,
        provider: SttProvider,
        original_filename: Option<&str>,
        file_size_bytes: Option<i64>,
        webhook_url: Option<&str>,
    ) -> Result<JobRecord> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO jobs (id, status, config, provider, original_filename, \
             file_size_bytes, webhook_url, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(JobStatus::Pending.as_str())
        .bind(serde_json::to_string(config)?)
        .bind(provider.as_str())
        .bind(original_filename)
        .bind(file_size_bytes)
        .bind(webhook_url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_job(&id, false).await
    }

    /// Load a job, failing with `NotFound` when absent.
    pub async fn get_job(&self, job_id: &str, include_chunks: bool) -> Result<JobRecord> {
        self.get_job_opt(job_id, include_chunks)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("job {job_id}")))
    }

    /// Load a job, `None` when absent.
    pub async fn get_job_opt(
        &self,
        job_id: &str,
        include_chunks: bool,
    ) -> Result<Option<JobRecord>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut job = map_job_row(&row)?;
        if include_chunks {
            job.chunks = self.get_chunks_for_job(job_id).await?;
        }
        Ok(Some(job))
    }

    /// List jobs, newest first, optionally filtered by status.
    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JobRecord>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT * FROM jobs WHERE status = ? \
                     ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(status.as_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ? OFFSET ?")
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(map_job_row).collect()
    }

    /// Update job status; error fields are written on failure transitions,
    /// `completed_at` when entering `completed`.
    pub async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error_message: Option<&str>,
        error_code: Option<&str>,
    ) -> Result<JobRecord> {
        let now = Utc::now();
        let completed_at = (status == JobStatus::Completed).then_some(now);

        let result = sqlx::query(
            "UPDATE jobs SET status = ?, \
             error_message = COALESCE(?, error_message), \
             error_code = COALESCE(?, error_code), \
             completed_at = COALESCE(?, completed_at), \
             updated_at = ? \
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(error_code)
        .bind(completed_at)
        .bind(now)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("job {job_id}")));
        }
        self.get_job(job_id, false).await
    }

    /// Record blob key and probe results after upload; job moves to
    /// `uploaded`.
    pub async fn update_file_info(
        &self,
        job_id: &str,
        original_key: &str,
        duration_seconds: f64,
        audio_format: &str,
    ) -> Result<JobRecord> {
        sqlx::query(
            "UPDATE jobs SET original_key = ?, duration_seconds = ?, audio_format = ?, \
             status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(original_key)
        .bind(duration_seconds)
        .bind(audio_format)
        .bind(JobStatus::Uploaded.as_str())
        .bind(Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        self.get_job(job_id, false).await
    }

    /// Set the chunk total once the chunker has run.
    pub async fn update_chunk_counts(&self, job_id: &str, total_chunks: i64) -> Result<()> {
        sqlx::query("UPDATE jobs SET total_chunks = ?, updated_at = ? WHERE id = ?")
            .bind(total_chunks)
            .bind(Utc::now())
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bump the completed counter; strictly monotonic per job.
    pub async fn increment_completed_chunks(&self, job_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE jobs SET completed_chunks = completed_chunks + 1, updated_at = ? \
             WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Store the merged result: inline summary, blob key, `completed`.
    pub async fn set_result(
        &self,
        job_id: &str,
        summary: &serde_json::Value,
        result_key: &str,
    ) -> Result<JobRecord> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE jobs SET result_summary = ?, result_key = ?, status = ?, \
             completed_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(serde_json::to_string(summary)?)
        .bind(result_key)
        .bind(JobStatus::Completed.as_str())
        .bind(now)
        .bind(now)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        self.get_job(job_id, false).await
    }

    /// At-most-once webhook delivery record.
    pub async fn mark_webhook_sent(&self, job_id: &str) -> Result<()> {
        sqlx::query("UPDATE jobs SET webhook_sent = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a job and its chunks. Idempotent.
    pub async fn delete_job(&self, job_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE job_id = ?")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Fail in-flight jobs whose `updated_at` is older than
    /// `stale_minutes`. Returns the number of rows swept.
    pub async fn fail_stale_jobs(&self, stale_minutes: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::minutes(stale_minutes);
        let result = sqlx::query(
            "UPDATE jobs SET status = ?, error_message = ?, updated_at = ? \
             WHERE status IN (?, ?) AND updated_at < ?",
        )
        .bind(JobStatus::Failed.as_str())
        .bind("Job was interrupted by a service restart; please resubmit.")
        .bind(Utc::now())
        .bind(JobStatus::Processing.as_str())
        .bind(JobStatus::Uploaded.as_str())
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Terminal jobs older than `retention_days`, oldest first.
    pub async fn get_expired_jobs(
        &self,
        retention_days: i64,
        batch_size: i64,
    ) -> Result<Vec<JobRecord>> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let rows = sqlx::query(
            "SELECT * FROM jobs WHERE status IN (?, ?) AND created_at < ? \
             ORDER BY created_at ASC LIMIT ?",
        )
        .bind(JobStatus::Completed.as_str())
        .bind(JobStatus::Failed.as_str())
        .bind(cutoff)
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_job_row).collect()
    }

    // -- chunks ----------------------------------------------------------

    /// Create all chunk rows for a job in one transaction.
    pub async fn create_chunks_batch(
        &self,
        job_id: &str,
        spans: &[(i64, f64, f64)],
    ) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for (chunk_index, start_time, end_time) in spans {
            sqlx::query(
                "INSERT INTO chunks (id, job_id, chunk_index, status, start_time, end_time, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(job_id)
            .bind(chunk_index)
            .bind(ChunkStatus::Pending.as_str())
            .bind(start_time)
            .bind(end_time)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_chunk(&self, job_id: &str, chunk_index: i64) -> Result<Option<ChunkRecord>> {
        let row = sqlx::query("SELECT * FROM chunks WHERE job_id = ? AND chunk_index = ?")
            .bind(job_id)
            .bind(chunk_index)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_chunk_row).transpose()
    }

    /// All chunks for a job, in index order.
    pub async fn get_chunks_for_job(&self, job_id: &str) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query("SELECT * FROM chunks WHERE job_id = ? ORDER BY chunk_index")
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_chunk_row).collect()
    }

    /// Mark a chunk `processing` and bump its attempt counter.
    pub async fn mark_chunk_processing(&self, chunk_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE chunks SET status = ?, attempt_count = attempt_count + 1 WHERE id = ?",
        )
        .bind(ChunkStatus::Processing.as_str())
        .bind(chunk_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Store a chunk's transcription result and mark it `completed`.
    pub async fn set_chunk_result(
        &self,
        chunk_id: &str,
        result: &TranscriptionResponse,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE chunks SET result = ?, status = ?, processed_at = ? WHERE id = ?",
        )
        .bind(serde_json::to_string(result)?)
        .bind(ChunkStatus::Completed.as_str())
        .bind(Utc::now())
        .bind(chunk_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a chunk `failed`, recording the error.
    pub async fn set_chunk_failed(&self, chunk_id: &str, error: &str) -> Result<()> {
        sqlx::query("UPDATE chunks SET status = ?, last_error = ? WHERE id = ?")
            .bind(ChunkStatus::Failed.as_str())
            .bind(error)
            .bind(chunk_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Reset `failed` chunks to `pending` for a retry; completed chunks
    /// are untouched. Returns the number reset.
    pub async fn reset_failed_chunks(&self, job_id: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE chunks SET status = ?, last_error = NULL \
             WHERE job_id = ? AND status = ?",
        )
        .bind(ChunkStatus::Pending.as_str())
        .bind(job_id)
        .bind(ChunkStatus::Failed.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn map_job_row(row: &SqliteRow) -> Result<JobRecord> {
    let status_str: String = row.try_get("status")?;
    let status = JobStatus::parse(&status_str)
        .ok_or_else(|| CoreError::internal(format!("unknown job status: {status_str}")))?;

    let provider_str: String = row.try_get("provider")?;
    let provider: SttProvider = provider_str.parse().map_err(CoreError::Internal)?;

    let config_str: String = row.try_get("config")?;
    let config: JobConfig = serde_json::from_str(&config_str)?;

    let result_summary: Option<String> = row.try_get("result_summary")?;
    let result_summary = result_summary
        .map(|s| serde_json::from_str(&s))
        .transpose()?;

    Ok(JobRecord {
        id: row.try_get("id")?,
        status,
        config,
        provider,
        original_filename: row.try_get("original_filename")?,
        file_size_bytes: row.try_get("file_size_bytes")?,
        duration_seconds: row.try_get("duration_seconds")?,
        audio_format: row.try_get("audio_format")?,
        original_key: row.try_get("original_key")?,
        result_key: row.try_get("result_key")?,
        result_summary,
        error_message: row.try_get("error_message")?,
        error_code: row.try_get("error_code")?,
        total_chunks: row.try_get("total_chunks")?,
        completed_chunks: row.try_get("completed_chunks")?,
        webhook_url: row.try_get("webhook_url")?,
        webhook_sent: row.try_get("webhook_sent")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
        chunks: Vec::new(),
    })
}

fn map_chunk_row(row: &SqliteRow) -> Result<ChunkRecord> {
    let status_str: String = row.try_get("status")?;
    let status = ChunkStatus::parse(&status_str)
        .ok_or_else(|| CoreError::internal(format!("unknown chunk status: {status_str}")))?;

    let result: Option<String> = row.try_get("result")?;
    let result = result.map(|s| serde_json::from_str(&s)).transpose()?;

    Ok(ChunkRecord {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        chunk_index: row.try_get("chunk_index")?,
        status,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        attempt_count: row.try_get("attempt_count")?,
        last_error: row.try_get("last_error")?,
        result,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Segment;

    async fn store_with_job() -> (JobStore, String) {
        let store = JobStore::in_memory().await.unwrap();
        let job = store
            .create_job(
                &JobConfig::default(),
                SttProvider::Gemini,
                Some("talk.mp3"),
                Some(1024),
                None,
            )
            .await
            .unwrap();
        (store, job.id)
    }

    #[tokio::test]
    async fn create_and_load_job() {
        let (store, job_id) = store_with_job().await;
        let job = store.get_job(&job_id, false).await.unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.provider, SttProvider::Gemini);
        assert_eq!(job.original_filename.as_deref(), Some("talk.mp3"));
        assert_eq!(job.total_chunks, 0);
        assert!(!job.webhook_sent);
    }

    #[tokio::test]
    async fn missing_job_is_not_found() {
        let store = JobStore::in_memory().await.unwrap();
        match store.get_job("nope", false).await {
            Err(CoreError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_update_writes_error_fields() {
        let (store, job_id) = store_with_job().await;
        let job = store
            .update_status(&job_id, JobStatus::Failed, Some("boom"), Some("unknown"))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("boom"));
        assert_eq!(job.error_code.as_deref(), Some("unknown"));
    }

    #[tokio::test]
    async fn file_info_moves_job_to_uploaded() {
        let (store, job_id) = store_with_job().await;
        let job = store
            .update_file_info(&job_id, "jobs/x/original/talk.mp3", 123.4, "mp3")
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Uploaded);
        assert_eq!(job.duration_seconds, Some(123.4));
        assert_eq!(job.original_key.as_deref(), Some("jobs/x/original/talk.mp3"));
    }

    #[tokio::test]
    async fn chunk_batch_and_ordering() {
        let (store, job_id) = store_with_job().await;
        store
            .create_chunks_batch(&job_id, &[(0, 0.0, 300.0), (1, 297.0, 597.0), (2, 594.0, 700.0)])
            .await
            .unwrap();

        let chunks = store.get_chunks_for_job(&job_id).await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].start_time, 297.0);
        assert!(chunks.iter().all(|c| c.status == ChunkStatus::Pending));

        let job = store.get_job(&job_id, true).await.unwrap();
        assert_eq!(job.chunks.len(), 3);
    }

    #[tokio::test]
    async fn mark_processing_increments_attempts() {
        let (store, job_id) = store_with_job().await;
        store.create_chunks_batch(&job_id, &[(0, 0.0, 60.0)]).await.unwrap();
        let chunk = store.get_chunk(&job_id, 0).await.unwrap().unwrap();

        store.mark_chunk_processing(&chunk.id).await.unwrap();
        store.mark_chunk_processing(&chunk.id).await.unwrap();

        let chunk = store.get_chunk(&job_id, 0).await.unwrap().unwrap();
        assert_eq!(chunk.status, ChunkStatus::Processing);
        assert_eq!(chunk.attempt_count, 2);
    }

    #[tokio::test]
    async fn chunk_result_round_trips() {
        let (store, job_id) = store_with_job().await;
        store.create_chunks_batch(&job_id, &[(0, 0.0, 60.0)]).await.unwrap();
        let chunk = store.get_chunk(&job_id, 0).await.unwrap().unwrap();

        let response = TranscriptionResponse {
            text: "բարև".to_string(),
            segments: vec![Segment {
                text: "բարև".to_string(),
                start_time: 0.0,
                end_time: 2.0,
                speaker_id: Some("SPEAKER_00".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        store.set_chunk_result(&chunk.id, &response).await.unwrap();

        let chunk = store.get_chunk(&job_id, 0).await.unwrap().unwrap();
        assert_eq!(chunk.status, ChunkStatus::Completed);
        let stored = chunk.result.unwrap();
        assert_eq!(stored.text, "բարև");
        assert_eq!(stored.segments.len(), 1);
        assert!(chunk.processed_at.is_some());
    }

    #[tokio::test]
    async fn completed_chunks_counter_is_monotonic() {
        let (store, job_id) = store_with_job().await;
        let mut last = 0;
        for _ in 0..5 {
            store.increment_completed_chunks(&job_id).await.unwrap();
            let job = store.get_job(&job_id, false).await.unwrap();
            assert!(job.completed_chunks > last);
            last = job.completed_chunks;
        }
        assert_eq!(last, 5);
    }

    #[tokio::test]
    async fn reset_touches_only_failed_chunks() {
        let (store, job_id) = store_with_job().await;
        store
            .create_chunks_batch(&job_id, &[(0, 0.0, 10.0), (1, 8.0, 18.0), (2, 16.0, 26.0)])
            .await
            .unwrap();

        let chunks = store.get_chunks_for_job(&job_id).await.unwrap();
        store
            .set_chunk_result(&chunks[0].id, &TranscriptionResponse::default())
            .await
            .unwrap();
        store.set_chunk_failed(&chunks[1].id, "provider exploded").await.unwrap();

        let reset = store.reset_failed_chunks(&job_id).await.unwrap();
        assert_eq!(reset, 1);

        let chunks = store.get_chunks_for_job(&job_id).await.unwrap();
        assert_eq!(chunks[0].status, ChunkStatus::Completed);
        assert_eq!(chunks[1].status, ChunkStatus::Pending);
        assert!(chunks[1].last_error.is_none());
        assert_eq!(chunks[2].status, ChunkStatus::Pending);
    }

    #[tokio::test]
    async fn set_result_completes_job() {
        let (store, job_id) = store_with_job().await;
        let summary = serde_json::json!({"full_text": "hello", "segments": []});

        let job = store
            .set_result(&job_id, &summary, "jobs/x/result/transcript.json")
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());
        assert_eq!(job.result_summary.unwrap()["full_text"], "hello");
    }

    #[tokio::test]
    async fn delete_job_cascades_and_is_idempotent() {
        let (store, job_id) = store_with_job().await;
        store.create_chunks_batch(&job_id, &[(0, 0.0, 10.0)]).await.unwrap();

        store.delete_job(&job_id).await.unwrap();
        store.delete_job(&job_id).await.unwrap();

        assert!(store.get_job_opt(&job_id, false).await.unwrap().is_none());
        assert!(store.get_chunks_for_job(&job_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_sweep_hits_only_inflight_jobs() {
        let (store, processing_id) = store_with_job().await;
        store
            .update_status(&processing_id, JobStatus::Processing, None, None)
            .await
            .unwrap();

        let pending = store
            .create_job(&JobConfig::default(), SttProvider::OpenAI, None, None, None)
            .await
            .unwrap();

        // cutoff of "now" sweeps anything already written
        let swept = store.fail_stale_jobs(0).await.unwrap();
        assert_eq!(swept, 1);

        let job = store.get_job(&processing_id, false).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("restart"));

        let job = store.get_job(&pending.id, false).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn expired_jobs_are_terminal_and_old() {
        let (store, job_id) = store_with_job().await;
        store
            .update_status(&job_id, JobStatus::Failed, Some("x"), None)
            .await
            .unwrap();

        // retention of -1 day puts the cutoff in the future
        let expired = store.get_expired_jobs(-1, 50).await.unwrap();
        assert_eq!(expired.len(), 1);

        // a generous retention keeps fresh jobs
        let expired = store.get_expired_jobs(30, 50).await.unwrap();
        assert!(expired.is_empty());
    }

    #[tokio::test]
    async fn list_jobs_filters_by_status() {
        let (store, job_id) = store_with_job().await;
        store
            .create_job(&JobConfig::default(), SttProvider::OpenAI, None, None, None)
            .await
            .unwrap();
        store
            .update_status(&job_id, JobStatus::Cancelled, None, None)
            .await
            .unwrap();

        let all = store.list_jobs(None, 50, 0).await.unwrap();
        assert_eq!(all.len(), 2);

        let cancelled = store
            .list_jobs(Some(JobStatus::Cancelled), 50, 0)
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, job_id);
    }
}
