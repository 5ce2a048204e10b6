//! Job worker: queue consumption and the per-job pipeline.
//!
//! One worker processes one job at a time; scale comes from running more
//! worker processes. Within a job, chunks are strictly sequential — each
//! chunk's prompt depends on the previous chunks' results (context carry
//! and speaker-id reuse), and sequential processing bounds per-job
//! rate-limit pressure on the vendor.
//!
//! ```text
//! queue ──▶ admit ──▶ fetch ──▶ preprocess ──▶ chunk ──▶
//!     per-chunk: retry(provider) + coverage check ──▶ merge ──▶ persist
//! ```

mod context;
mod pipeline;
mod webhook;

pub use context::{coverage_gap, extract_context, gap_threshold};
pub use webhook::deliver_webhook;

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::ratelimit::rate_limiter;
use crate::settings::{ProviderSettings, Settings};
use crate::store::{
    BlobStore, JobStore, QueuedTask, TaskQueue, QUEUE_TRANSCRIPTION, QUEUE_WEBHOOKS,
    TASK_PROCESS_JOB, TASK_SEND_WEBHOOK,
};

/// How long a claimed task stays invisible before redelivery. Matches the
/// upper bound of one job pipeline run; a crashed worker's job comes back
/// after this.
const TASK_VISIBILITY_SECS: i64 = 3600;

/// Idle poll interval when the queue is drained.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Seed the rate limiter with each vendor's configured rpm budget.
pub async fn setup_provider_limits(settings: &ProviderSettings) {
    for provider in crate::config::SttProvider::all() {
        rate_limiter()
            .configure_provider(provider.as_str(), settings.rpm_limit_for(*provider), None)
            .await;
    }
}

/// Processes transcription jobs and webhook deliveries from the queue.
pub struct JobWorker {
    store: JobStore,
    blobs: Arc<dyn BlobStore>,
    queue: Arc<dyn TaskQueue>,
    settings: Settings,
}

impl JobWorker {
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

    /// Poll the transcription queue forever, one job at a time.
    pub async fn run(&self) -> Result<()> {
        setup_provider_limits(&self.settings.providers).await;
        info!("transcription worker started");

        loop {
            match self.queue.claim(QUEUE_TRANSCRIPTION, TASK_VISIBILITY_SECS).await {
                Ok(Some(task)) => self.handle_task(task).await,
                Ok(None) => tokio::time::sleep(POLL_INTERVAL).await,
                Err(e) => {
                    error!(error = %e, "queue claim failed");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    }

    /// Poll the webhook queue forever.
    pub async fn run_webhooks(&self) -> Result<()> {
        info!("webhook worker started");

        loop {
            match self.queue.claim(QUEUE_WEBHOOKS, TASK_VISIBILITY_SECS).await {
                Ok(Some(task)) => self.handle_task(task).await,
                Ok(None) => tokio::time::sleep(POLL_INTERVAL).await,
                Err(e) => {
                    error!(error = %e, "queue claim failed");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    }

    async fn handle_task(&self, task: QueuedTask) {
        match task.task.as_str() {
            TASK_PROCESS_JOB => {
                if let Some(job_id) = task.payload.get("job_id").and_then(|v| v.as_str()) {
                    // Failures are recorded on the job row; the task itself
                    // is done either way.
                    if let Err(e) = self.process_job(job_id).await {
                        error!(job_id, error = %e, "transcription job failed");
                    }
                } else {
                    warn!(task_id = %task.id, "process task without a job_id, dropping");
                }
            }
            TASK_SEND_WEBHOOK => {
                let job_id = task.payload.get("job_id").and_then(|v| v.as_str());
                let url = task.payload.get("webhook_url").and_then(|v| v.as_str());
                if let (Some(job_id), Some(url)) = (job_id, url) {
                    if let Err(e) = deliver_webhook(&self.store, job_id, url).await {
                        error!(job_id, error = %e, "webhook task failed");
                    }
                } else {
                    warn!(task_id = %task.id, "webhook task missing fields, dropping");
                }
            }
            other => warn!(task = other, "unknown task type, dropping"),
        }

        if let Err(e) = self.queue.ack(&task.id).await {
            error!(task_id = %task.id, error = %e, "failed to ack task");
        }
    }
}
