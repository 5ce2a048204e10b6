//! Show a job's status.

use anyhow::Result;

use crate::app::App;

pub async fn run(app: &App, job_id: &str) -> Result<()> {
    let status = app.orchestrator().get_status(job_id).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
