//! Show per-chunk progress for a job.

use anyhow::Result;

use crate::app::App;

pub async fn run(app: &App, job_id: &str) -> Result<()> {
    let progress = app.orchestrator().get_progress(job_id).await?;
    println!("{}", serde_json::to_string_pretty(&progress)?);
    Ok(())
}
