//! Fetch the merged transcript of a completed job.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::app::App;

pub async fn run(app: &App, job_id: &str, output: Option<&Path>) -> Result<()> {
    let Some(result) = app.orchestrator().get_result(job_id).await? else {
        bail!("job {job_id} has no result yet (not completed)");
    };

    let rendered = serde_json::to_string_pretty(&result)?;

    match output {
        Some(path) => {
            tokio::fs::write(path, rendered)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Transcript written to {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
