//! Public operations over the job lifecycle.
//!
//! The orchestrator is the service surface the API layer (out of tree)
//! calls into: create a job, attach audio, submit it to the queue, observe
//! progress, retry, cancel, delete. It owns the lifecycle preconditions;
//! the worker owns everything that happens after pickup.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::config::SttProvider;
use crate::error::{CoreError, Result};
use crate::job::{ChunkStatus, JobConfig, JobRecord, JobStatus};
use crate::media;
use crate::settings::Settings;
use crate::store::{
    job_prefix, original_key, BlobStore, JobStore, TaskQueue, QUEUE_TRANSCRIPTION,
    TASK_PROCESS_JOB,
};

/// Status read model for one job.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub job_id: String,
    pub status: String,
    pub provider: String,
    pub total_chunks: i64,
    pub completed_chunks: i64,
    pub progress_percent: f64,
    pub duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
}

impl StatusView {
    fn from_job(job: &JobRecord) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status.as_str().to_string(),
            provider: job.provider.as_str().to_string(),
            total_chunks: job.total_chunks,
            completed_chunks: job.completed_chunks,
            progress_percent: job.progress_percent(),
            duration_seconds: job.duration_seconds,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
            error_message: job.error_message.clone(),
            error_code: job.error_code.clone(),
        }
    }
}

/// Per-chunk detail in the progress read model.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkView {
    pub index: i64,
    pub status: String,
    pub start_time: f64,
    pub end_time: f64,
    pub attempt_count: i64,
    pub error: Option<String>,
}

/// Detailed progress including chunk state.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    pub job_id: String,
    pub status: String,
    pub total_chunks: i64,
    pub completed_chunks: i64,
    pub failed_chunks: i64,
    pub progress_percent: f64,
    pub chunks: Vec<ChunkView>,
}

/// Result of attaching audio to a job.
#[derive(Debug, Clone, Serialize)]
pub struct UploadView {
    pub key: String,
    pub duration_seconds: f64,
    pub format: String,
    pub sample_rate: u32,
    pub channels: u32,
}

/// Orchestrates the transcription job workflow.
pub struct Orchestrator {
    store: JobStore,
    blobs: Arc<dyn BlobStore>,
    queue: Arc<dyn TaskQueue>,
    settings: Settings,
}

impl Orchestrator {
    pub fn new(
        store: JobStore,
        blobs: Arc<dyn BlobStore>,
        queue: Arc<dyn TaskQueue>,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            blobs,
            queue,
            settings,
        }
    }

    /// Create a new transcription job in `pending`.
    pub async fn create_job(
        &self,
        config: JobConfig,
        provider: SttProvider,
        filename: Option<&str>,
        file_size: Option<i64>,
        webhook_url: Option<&str>,
    ) -> Result<String> {
        let job = self
            .store
            .create_job(&config, provider, filename, file_size, webhook_url)
            .await?;

        info!(job_id = %job.id, provider = %provider, filename, "created transcription job");
        Ok(job.id)
    }

    /// Attach the original audio: validate, store the blob, probe media,
    /// and move the job to `uploaded`.
    pub async fn upload_audio(
        &self,
        job_id: &str,
        audio_data: Vec<u8>,
        filename: &str,
    ) -> Result<UploadView> {
        let job = self.store.get_job(job_id, false).await?;
        if job.status != JobStatus::Pending {
            return Err(CoreError::validation(format!(
                "audio can only be uploaded to a pending job, status is {}",
                job.status
            )));
        }

        if !media::is_supported_filename(filename) {
            return Err(CoreError::validation(format!(
                "unsupported file type: {filename}"
            )));
        }
        if audio_data.len() as u64 > self.settings.limits.max_upload_bytes {
            return Err(CoreError::validation(format!(
                "file size {} exceeds maximum {} bytes",
                audio_data.len(),
                self.settings.limits.max_upload_bytes
            )));
        }

        // Probe before accepting: a broken container fails the upload, not
        // the worker later.
        let extension = media::file_extension(filename).unwrap_or_else(|| "wav".to_string());
        let scratch = tempfile::tempdir()?;
        let probe_path = scratch.path().join(format!("upload.{extension}"));
        tokio::fs::write(&probe_path, &audio_data).await?;
        let metadata = media::probe(&probe_path).await?;

        let key = original_key(job_id, filename);
        self.blobs.put(&key, &audio_data, "application/octet-stream").await?;

        self.store
            .update_file_info(job_id, &key, metadata.duration, &metadata.codec)
            .await?;

        info!(
            job_id,
            key,
            duration = metadata.duration,
            format = %metadata.codec,
            "uploaded audio for job"
        );

        Ok(UploadView {
            key,
            duration_seconds: metadata.duration,
            format: metadata.codec,
            sample_rate: metadata.sample_rate,
            channels: metadata.channels,
        })
    }

    /// Queue a job for processing.
    pub async fn submit_job(&self, job_id: &str) -> Result<String> {
        let job = self.store.get_job(job_id, false).await?;

        if !matches!(job.status, JobStatus::Pending | JobStatus::Uploaded) {
            return Err(CoreError::validation(format!(
                "job cannot be submitted in state: {}",
                job.status
            )));
        }
        if job.original_key.is_none() {
            return Err(CoreError::validation("no audio file uploaded for this job"));
        }

        let task_id = self
            .queue
            .enqueue(
                QUEUE_TRANSCRIPTION,
                TASK_PROCESS_JOB,
                serde_json::json!({ "job_id": job_id }),
            )
            .await?;

        info!(job_id, task_id, "submitted job for processing");
        Ok(task_id)
    }

    /// Current status and progress counters.
    pub async fn get_status(&self, job_id: &str) -> Result<StatusView> {
        let job = self.store.get_job(job_id, false).await?;
        Ok(StatusView::from_job(&job))
    }

    /// Detailed progress including per-chunk state.
    pub async fn get_progress(&self, job_id: &str) -> Result<ProgressView> {
        let job = self.store.get_job(job_id, true).await?;

        let chunks: Vec<ChunkView> = job
            .chunks
            .iter()
            .map(|c| ChunkView {
                index: c.chunk_index,
                status: c.status.as_str().to_string(),
                start_time: c.start_time,
                end_time: c.end_time,
                attempt_count: c.attempt_count,
                error: c.last_error.clone(),
            })
            .collect();

        let failed_chunks = job
            .chunks
            .iter()
            .filter(|c| c.status == ChunkStatus::Failed)
            .count() as i64;

        Ok(ProgressView {
            job_id: job.id.clone(),
            status: job.status.as_str().to_string(),
            total_chunks: job.total_chunks,
            completed_chunks: job.completed_chunks,
            failed_chunks,
            progress_percent: job.progress_percent(),
            chunks,
        })
    }

    /// Merged result for a completed job, `None` otherwise.
    pub async fn get_result(&self, job_id: &str) -> Result<Option<serde_json::Value>> {
        let job = self.store.get_job(job_id, false).await?;
        if job.status != JobStatus::Completed {
            return Ok(None);
        }
        Ok(job.result_summary)
    }

    /// List jobs, newest first.
    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StatusView>> {
        let jobs = self.store.list_jobs(status, limit, offset).await?;
        Ok(jobs.iter().map(StatusView::from_job).collect())
    }

    /// Retry a failed job from its last checkpoint: only `failed` chunks
    /// are reset, completed ones keep their results.
    pub async fn retry_job(&self, job_id: &str) -> Result<u64> {
        let job = self.store.get_job(job_id, false).await?;

        if job.status != JobStatus::Failed {
            return Err(CoreError::validation(format!(
                "can only retry failed jobs, current status: {}",
                job.status
            )));
        }

        let reset = self.store.reset_failed_chunks(job_id).await?;
        self.store
            .update_status(job_id, JobStatus::Processing, None, None)
            .await?;

        self.queue
            .enqueue(
                QUEUE_TRANSCRIPTION,
                TASK_PROCESS_JOB,
                serde_json::json!({ "job_id": job_id }),
            )
            .await?;

        info!(job_id, reset_chunks = reset, "retrying failed job");
        Ok(reset)
    }

    /// Cancel a non-terminal job. An in-flight worker aborts at its next
    /// retry checkpoint.
    pub async fn cancel_job(&self, job_id: &str) -> Result<()> {
        let job = self.store.get_job(job_id, false).await?;

        if !job.status.can_transition_to(JobStatus::Cancelled) {
            return Err(CoreError::validation(format!(
                "cannot cancel job in state: {}",
                job.status
            )));
        }

        self.store
            .update_status(job_id, JobStatus::Cancelled, None, None)
            .await?;
        info!(job_id, "cancelled job");
        Ok(())
    }

    /// Delete a job, its chunks, and every blob under its prefix.
    /// Idempotent: deleting an unknown job is a no-op.
    pub async fn delete_job(&self, job_id: &str) -> Result<u64> {
        let keys = self.blobs.list(&job_prefix(job_id)).await?;
        self.blobs.delete_many(&keys).await?;
        self.store.delete_job(job_id).await?;

        info!(job_id, deleted_files = keys.len(), "deleted job");
        Ok(keys.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FsBlobStore, SqliteQueue};

    async fn orchestrator() -> (tempfile::TempDir, Orchestrator) {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::in_memory().await.unwrap();
        let queue = SqliteQueue::new(store.pool().clone()).await.unwrap();
        let blobs = FsBlobStore::new(dir.path());
        let orchestrator = Orchestrator::new(
            store,
            Arc::new(blobs),
            Arc::new(queue),
            Settings::default(),
        );
        (dir, orchestrator)
    }

    #[tokio::test]
    async fn create_then_status() {
        let (_dir, orch) = orchestrator().await;
        let job_id = orch
            .create_job(JobConfig::default(), SttProvider::Gemini, Some("a.mp3"), None, None)
            .await
            .unwrap();

        let status = orch.get_status(&job_id).await.unwrap();
        assert_eq!(status.status, "pending");
        assert_eq!(status.provider, "gemini");
        assert_eq!(status.progress_percent, 0.0);
    }

    #[tokio::test]
    async fn submit_without_upload_is_rejected() {
        let (_dir, orch) = orchestrator().await;
        let job_id = orch
            .create_job(JobConfig::default(), SttProvider::Gemini, None, None, None)
            .await
            .unwrap();

        match orch.submit_job(&job_id).await {
            Err(CoreError::Validation(msg)) => assert!(msg.contains("no audio")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn submit_after_file_info_enqueues() {
        let (_dir, orch) = orchestrator().await;
        let job_id = orch
            .create_job(JobConfig::default(), SttProvider::Gemini, Some("a.mp3"), None, None)
            .await
            .unwrap();
        orch.store
            .update_file_info(&job_id, "jobs/x/original/a.mp3", 120.0, "mp3")
            .await
            .unwrap();

        let task_id = orch.submit_job(&job_id).await.unwrap();
        assert!(!task_id.is_empty());

        // submitting a cancelled job is illegal
        orch.cancel_job(&job_id).await.unwrap();
        assert!(orch.submit_job(&job_id).await.is_err());
    }

    #[tokio::test]
    async fn upload_rejects_unsupported_extension() {
        let (_dir, orch) = orchestrator().await;
        let job_id = orch
            .create_job(JobConfig::default(), SttProvider::Gemini, None, None, None)
            .await
            .unwrap();

        match orch.upload_audio(&job_id, vec![0u8; 16], "notes.txt").await {
            Err(CoreError::Validation(msg)) => assert!(msg.contains("unsupported")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn upload_rejects_oversized_file() {
        let (_dir, orch) = {
            let dir = tempfile::tempdir().unwrap();
            let store = JobStore::in_memory().await.unwrap();
            let queue = SqliteQueue::new(store.pool().clone()).await.unwrap();
            let mut settings = Settings::default();
            settings.limits.max_upload_bytes = 8;
            let orch = Orchestrator::new(
                store,
                Arc::new(FsBlobStore::new(dir.path())),
                Arc::new(queue),
                settings,
            );
            (dir, orch)
        };
        let job_id = orch
            .create_job(JobConfig::default(), SttProvider::Gemini, None, None, None)
            .await
            .unwrap();

        match orch.upload_audio(&job_id, vec![0u8; 64], "a.wav").await {
            Err(CoreError::Validation(msg)) => assert!(msg.contains("exceeds maximum")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_requires_failed_state() {
        let (_dir, orch) = orchestrator().await;
        let job_id = orch
            .create_job(JobConfig::default(), SttProvider::Gemini, None, None, None)
            .await
            .unwrap();

        assert!(orch.retry_job(&job_id).await.is_err());
    }

    #[tokio::test]
    async fn retry_resets_only_failed_chunks() {
        let (_dir, orch) = orchestrator().await;
        let job_id = orch
            .create_job(JobConfig::default(), SttProvider::Gemini, None, None, None)
            .await
            .unwrap();
        orch.store
            .create_chunks_batch(&job_id, &[(0, 0.0, 10.0), (1, 8.0, 18.0)])
            .await
            .unwrap();

        let chunks = orch.store.get_chunks_for_job(&job_id).await.unwrap();
        orch.store
            .set_chunk_result(&chunks[0].id, &Default::default())
            .await
            .unwrap();
        orch.store.set_chunk_failed(&chunks[1].id, "boom").await.unwrap();
        orch.store
            .update_status(&job_id, JobStatus::Failed, Some("boom"), Some("unknown"))
            .await
            .unwrap();

        let reset = orch.retry_job(&job_id).await.unwrap();
        assert_eq!(reset, 1);

        let status = orch.get_status(&job_id).await.unwrap();
        assert_eq!(status.status, "processing");

        let chunks = orch.store.get_chunks_for_job(&job_id).await.unwrap();
        assert_eq!(chunks[0].status, ChunkStatus::Completed);
        assert_eq!(chunks[1].status, ChunkStatus::Pending);
    }

    #[tokio::test]
    async fn cancel_terminal_job_is_rejected() {
        let (_dir, orch) = orchestrator().await;
        let job_id = orch
            .create_job(JobConfig::default(), SttProvider::Gemini, None, None, None)
            .await
            .unwrap();

        orch.cancel_job(&job_id).await.unwrap();
        assert!(orch.cancel_job(&job_id).await.is_err());
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_removes_blobs() {
        let (_dir, orch) = orchestrator().await;
        let job_id = orch
            .create_job(JobConfig::default(), SttProvider::Gemini, None, None, None)
            .await
            .unwrap();

        let key = original_key(&job_id, "a.mp3");
        orch.blobs.put(&key, b"bytes", "audio/mpeg").await.unwrap();

        let deleted = orch.delete_job(&job_id).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(!orch.blobs.exists(&key).await.unwrap());

        // second delete is a no-op
        let deleted = orch.delete_job(&job_id).await.unwrap();
        assert_eq!(deleted, 0);
        assert!(orch.store.get_job_opt(&job_id, false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn result_is_none_until_completed() {
        let (_dir, orch) = orchestrator().await;
        let job_id = orch
            .create_job(JobConfig::default(), SttProvider::Gemini, None, None, None)
            .await
            .unwrap();

        assert!(orch.get_result(&job_id).await.unwrap().is_none());

        let summary = serde_json::json!({"full_text": "done"});
        orch.store
            .set_result(&job_id, &summary, "jobs/x/result/transcript.json")
            .await
            .unwrap();

        let result = orch.get_result(&job_id).await.unwrap().unwrap();
        assert_eq!(result["full_text"], "done");
    }

    #[tokio::test]
    async fn progress_counts_failed_chunks() {
        let (_dir, orch) = orchestrator().await;
        let job_id = orch
            .create_job(JobConfig::default(), SttProvider::Gemini, None, None, None)
            .await
            .unwrap();
        orch.store
            .create_chunks_batch(&job_id, &[(0, 0.0, 10.0), (1, 8.0, 18.0), (2, 16.0, 26.0)])
            .await
            .unwrap();
        let chunks = orch.store.get_chunks_for_job(&job_id).await.unwrap();
        orch.store.set_chunk_failed(&chunks[1].id, "x").await.unwrap();

        let progress = orch.get_progress(&job_id).await.unwrap();
        assert_eq!(progress.chunks.len(), 3);
        assert_eq!(progress.failed_chunks, 1);
        assert_eq!(progress.chunks[1].error.as_deref(), Some("x"));
    }
}
