//! Delete a job and all of its artifacts.

use anyhow::Result;

use crate::app::App;

pub async fn run(app: &App, job_id: &str) -> Result<()> {
    let deleted = app.orchestrator().delete_job(job_id).await?;
    println!("Deleted job {job_id} ({deleted} stored files removed)");
    Ok(())
}
