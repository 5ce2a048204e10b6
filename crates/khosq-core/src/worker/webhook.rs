//! Webhook delivery for completed jobs.
//!
//! Runs as its own queued task so a slow or broken receiver never holds up
//! the transcription queue. Connection failures and 5xx responses are
//! retried with exponential backoff; 4xx responses mean the receiver
//! rejected the payload and retrying is pointless. `webhook_sent` is set
//! only after a success, which keeps delivery at-most-once afterwards.

use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::Result;
use crate::http::get_http_client;
use crate::store::JobStore;

const MAX_ATTEMPTS: u32 = 5;
const BASE_DELAY_SECS: u64 = 2;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// POST the job outcome to the configured URL.
pub async fn deliver_webhook(store: &JobStore, job_id: &str, webhook_url: &str) -> Result<()> {
    let Some(job) = store.get_job_opt(job_id, false).await? else {
        // Job deleted since completion; nothing to announce
        return Ok(());
    };

    if job.webhook_sent {
        return Ok(());
    }

    let payload = json!({
        "job_id": job.id,
        "status": job.status.as_str(),
        "result": job.result_summary,
        "completed_at": job.completed_at.map(|t| t.to_rfc3339()),
    });

    let client = get_http_client().map_err(|e| crate::error::CoreError::internal(e.to_string()))?;

    for attempt in 0..MAX_ATTEMPTS {
        let sent = client
            .post(webhook_url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await;

        match sent {
            Ok(response) if response.status().is_success() => {
                store.mark_webhook_sent(job_id).await?;
                info!(job_id, webhook_url, "webhook sent");
                return Ok(());
            }
            Ok(response) if response.status().is_client_error() => {
                // The receiver refused the payload; retrying won't help
                warn!(
                    job_id,
                    webhook_url,
                    status = %response.status(),
                    "webhook rejected by receiver, giving up"
                );
                return Ok(());
            }
            Ok(response) => {
                warn!(
                    job_id,
                    attempt = attempt + 1,
                    status = %response.status(),
                    "webhook delivery failed"
                );
            }
            Err(e) => {
                warn!(
                    job_id,
                    attempt = attempt + 1,
                    error = %e,
                    "webhook delivery failed"
                );
            }
        }

        if attempt + 1 < MAX_ATTEMPTS {
            tokio::time::sleep(Duration::from_secs(BASE_DELAY_SECS << attempt)).await;
        }
    }

    warn!(job_id, webhook_url, "webhook delivery exhausted all attempts");
    Ok(())
}
