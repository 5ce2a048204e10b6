//! At-least-once task queue.
//!
//! A SQLite table in the job database: claiming a task sets a visibility
//! deadline instead of deleting it, so a worker that dies mid-job gets the
//! task redelivered when the deadline passes. The admit step of the worker
//! makes redelivery harmless.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use uuid::Uuid;

use crate::error::Result;

/// Queue carrying job-processing tasks.
pub const QUEUE_TRANSCRIPTION: &str = "transcription";
/// Queue carrying webhook deliveries.
pub const QUEUE_WEBHOOKS: &str = "webhooks";

/// Task name for processing one job end to end.
pub const TASK_PROCESS_JOB: &str = "process_transcription_job";
/// Task name for delivering one webhook.
pub const TASK_SEND_WEBHOOK: &str = "send_webhook";

const QUEUE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS queue_tasks (
    id           TEXT PRIMARY KEY,
    queue        TEXT NOT NULL,
    task         TEXT NOT NULL,
    payload      TEXT NOT NULL,
    attempts     INTEGER NOT NULL DEFAULT 0,
    available_at TEXT NOT NULL,
    created_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_queue_tasks_queue ON queue_tasks (queue, available_at)
"#;

/// A claimed task.
#[derive(Debug, Clone)]
pub struct QueuedTask {
    pub id: String,
    pub queue: String,
    pub task: String,
    pub payload: serde_json::Value,
    /// Delivery attempts including this one.
    pub attempts: i64,
}

/// Deliver tasks to workers at least once.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Publish a task onto a queue.
    async fn enqueue(&self, queue: &str, task: &str, payload: serde_json::Value)
        -> Result<String>;

    /// Claim the next available task, making it invisible for
    /// `visibility_secs`. Returns `None` when the queue is drained.
    async fn claim(&self, queue: &str, visibility_secs: i64) -> Result<Option<QueuedTask>>;

    /// Acknowledge (delete) a completed task.
    async fn ack(&self, task_id: &str) -> Result<()>;

    /// Make a claimed task immediately available again.
    async fn release(&self, task_id: &str) -> Result<()>;
}

/// SQLite implementation of [`TaskQueue`].
#[derive(Clone)]
pub struct SqliteQueue {
    pool: SqlitePool,
}

impl SqliteQueue {
    /// Wrap an existing pool (normally the job store's), creating the
    /// queue table if needed.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        for statement in QUEUE_DDL.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }
}

#[async_trait]
impl TaskQueue for SqliteQueue {
    async fn enqueue(
        &self,
        queue: &str,
        task: &str,
        payload: serde_json::Value,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO queue_tasks (id, queue, task, payload, available_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(queue)
        .bind(task)
        .bind(serde_json::to_string(&payload)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn claim(&self, queue: &str, visibility_secs: i64) -> Result<Option<QueuedTask>> {
        let now = Utc::now();
        let deadline: DateTime<Utc> = now + Duration::seconds(visibility_secs);

        // Single-statement claim keeps concurrent workers from double
        // claiming within the visibility window.
        let row = sqlx::query(
            "UPDATE queue_tasks \
             SET available_at = ?, attempts = attempts + 1 \
             WHERE id = ( \
                 SELECT id FROM queue_tasks \
                 WHERE queue = ? AND available_at <= ? \
                 ORDER BY created_at, rowid LIMIT 1 \
             ) \
             RETURNING id, queue, task, payload, attempts",
        )
        .bind(deadline)
        .bind(queue)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload_str: String = row.try_get("payload")?;
        Ok(Some(QueuedTask {
            id: row.try_get("id")?,
            queue: row.try_get("queue")?,
            task: row.try_get("task")?,
            payload: serde_json::from_str(&payload_str)?,
            attempts: row.try_get("attempts")?,
        }))
    }

    async fn ack(&self, task_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM queue_tasks WHERE id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn release(&self, task_id: &str) -> Result<()> {
        sqlx::query("UPDATE queue_tasks SET available_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JobStore;

    async fn queue() -> SqliteQueue {
        let store = JobStore::in_memory().await.unwrap();
        SqliteQueue::new(store.pool().clone()).await.unwrap()
    }

    #[tokio::test]
    async fn enqueue_claim_ack() {
        let queue = queue().await;
        queue
            .enqueue(
                QUEUE_TRANSCRIPTION,
                TASK_PROCESS_JOB,
                serde_json::json!({"job_id": "j1"}),
            )
            .await
            .unwrap();

        let task = queue.claim(QUEUE_TRANSCRIPTION, 60).await.unwrap().unwrap();
        assert_eq!(task.task, TASK_PROCESS_JOB);
        assert_eq!(task.payload["job_id"], "j1");
        assert_eq!(task.attempts, 1);

        // invisible while claimed
        assert!(queue.claim(QUEUE_TRANSCRIPTION, 60).await.unwrap().is_none());

        queue.ack(&task.id).await.unwrap();
        assert!(queue.claim(QUEUE_TRANSCRIPTION, 60).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_queue_claims_none() {
        let queue = queue().await;
        assert!(queue.claim(QUEUE_WEBHOOKS, 60).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn queues_are_isolated() {
        let queue = queue().await;
        queue
            .enqueue(QUEUE_WEBHOOKS, TASK_SEND_WEBHOOK, serde_json::json!({}))
            .await
            .unwrap();

        assert!(queue.claim(QUEUE_TRANSCRIPTION, 60).await.unwrap().is_none());
        assert!(queue.claim(QUEUE_WEBHOOKS, 60).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_visibility_means_redelivery() {
        let queue = queue().await;
        queue
            .enqueue(
                QUEUE_TRANSCRIPTION,
                TASK_PROCESS_JOB,
                serde_json::json!({"job_id": "j1"}),
            )
            .await
            .unwrap();

        // visibility of zero: the claim expires immediately
        let first = queue.claim(QUEUE_TRANSCRIPTION, 0).await.unwrap().unwrap();
        let second = queue.claim(QUEUE_TRANSCRIPTION, 60).await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.attempts, 2);
    }

    #[tokio::test]
    async fn release_makes_task_visible_again() {
        let queue = queue().await;
        queue
            .enqueue(QUEUE_TRANSCRIPTION, TASK_PROCESS_JOB, serde_json::json!({}))
            .await
            .unwrap();

        let task = queue.claim(QUEUE_TRANSCRIPTION, 300).await.unwrap().unwrap();
        queue.release(&task.id).await.unwrap();

        assert!(queue.claim(QUEUE_TRANSCRIPTION, 300).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn fifo_within_a_queue() {
        let queue = queue().await;
        for i in 0..3 {
            queue
                .enqueue(
                    QUEUE_TRANSCRIPTION,
                    TASK_PROCESS_JOB,
                    serde_json::json!({"n": i}),
                )
                .await
                .unwrap();
        }

        for expected in 0..3 {
            let task = queue.claim(QUEUE_TRANSCRIPTION, 300).await.unwrap().unwrap();
            assert_eq!(task.payload["n"], expected);
        }
    }
}
