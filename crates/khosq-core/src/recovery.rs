//! Startup recovery and retention janitor.
//!
//! Crash recovery is two-layered: persisted chunk rows let a redelivered
//! job resume mid-pipeline, and this module sweeps the jobs nobody will
//! ever redeliver — rows stuck in `processing`/`uploaded` since before a
//! restart — into `failed` so they don't sit orphaned forever.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::store::{job_prefix, BlobStore, JobStore};

/// Jobs evicted per janitor pass.
const SWEEP_BATCH_SIZE: i64 = 50;

/// Fail in-flight jobs untouched for longer than `stale_minutes`.
///
/// Run once at process startup, before the worker starts claiming tasks.
pub async fn recover_stale_jobs(store: &JobStore, stale_minutes: i64) -> Result<u64> {
    let swept = store.fail_stale_jobs(stale_minutes).await?;
    if swept > 0 {
        warn!(count = swept, "recovered stale jobs on startup");
    }
    Ok(swept)
}

/// Periodic eviction of expired terminal jobs and their artifacts.
pub struct Janitor {
    store: JobStore,
    blobs: Arc<dyn BlobStore>,
    retention_days: i64,
}

impl Janitor {
    pub fn new(store: JobStore, blobs: Arc<dyn BlobStore>, retention_days: i64) -> Self {
        Self {
            store,
            blobs,
            retention_days,
        }
    }

    /// Run the daily sweep loop. A non-positive retention disables it.
    pub async fn run(&self) -> Result<()> {
        if self.retention_days <= 0 {
            info!("janitor disabled (retention_days <= 0)");
            return Ok(());
        }

        let mut interval = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
        loop {
            interval.tick().await;
            match self.sweep_once().await {
                Ok(0) => {}
                Ok(evicted) => info!(evicted, "janitor evicted expired jobs"),
                Err(e) => error!(error = %e, "janitor sweep failed"),
            }
        }
    }

    /// Evict one batch of expired jobs: blobs first, then rows (chunks
    /// cascade with the job).
    pub async fn sweep_once(&self) -> Result<u64> {
        let expired = self
            .store
            .get_expired_jobs(self.retention_days, SWEEP_BATCH_SIZE)
            .await?;

        let mut evicted = 0u64;
        for job in &expired {
            let keys = self.blobs.list(&job_prefix(&job.id)).await?;
            self.blobs.delete_many(&keys).await?;
            self.store.delete_job(&job.id).await?;
            evicted += 1;
        }

        Ok(evicted)
    }
}
