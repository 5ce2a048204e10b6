//! Cancel a running job.

use anyhow::Result;

use crate::app::App;

pub async fn run(app: &App, job_id: &str) -> Result<()> {
    app.orchestrator().cancel_job(job_id).await?;
    println!("Cancelled job {job_id}");
    println!("An in-flight worker stops at its next retry checkpoint.");
    Ok(())
}
