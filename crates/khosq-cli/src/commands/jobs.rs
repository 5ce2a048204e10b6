//! List jobs.

use anyhow::{bail, Result};

use crate::app::App;
use khosq_core::JobStatus;

pub async fn run(app: &App, status: Option<&str>, limit: i64) -> Result<()> {
    let status = match status {
        Some(s) => match JobStatus::parse(s) {
            Some(status) => Some(status),
            None => bail!("unknown status filter: {s}"),
        },
        None => None,
    };

    let jobs = app.orchestrator().list_jobs(status, limit, 0).await?;

    if jobs.is_empty() {
        println!("No jobs.");
        return Ok(());
    }

    for job in jobs {
        println!(
            "{}  {:<10}  {:<10}  {:>3}/{:<3}  {}",
            job.job_id,
            job.status,
            job.provider,
            job.completed_chunks,
            job.total_chunks,
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }

    Ok(())
}
