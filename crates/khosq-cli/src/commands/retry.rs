//! Retry a failed job from its last checkpoint.

use anyhow::Result;

use crate::app::App;

pub async fn run(app: &App, job_id: &str) -> Result<()> {
    let reset = app.orchestrator().retry_job(job_id).await?;
    println!("Retrying job {job_id} ({reset} failed chunks reset)");
    Ok(())
}
