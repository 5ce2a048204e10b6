//! Submit a media file and optionally wait for the transcript.

use anyhow::{bail, Context, Result};
use std::time::Duration;

use crate::app::App;
use crate::args::SubmitArgs;
use khosq_core::job::{JobConfig, JobStatus};
use khosq_core::SttProvider;

const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub async fn run(app: &App, args: SubmitArgs) -> Result<()> {
    let provider: SttProvider = args
        .provider
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let filename = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("input path has no file name")?;

    let audio_data = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;

    let mut config = JobConfig::default();
    config.language = args.language;
    config.context.prompt = args.prompt;
    config.context.domain = args.domain;
    config.context.custom_vocabulary = args.vocabulary;
    config.diarization.enabled = !args.no_diarization;
    config.diarization.max_speakers = args.max_speakers;

    let orchestrator = app.orchestrator();

    let job_id = orchestrator
        .create_job(
            config,
            provider,
            Some(&filename),
            Some(audio_data.len() as i64),
            args.webhook.as_deref(),
        )
        .await?;

    let upload = orchestrator
        .upload_audio(&job_id, audio_data, &filename)
        .await?;
    println!(
        "Uploaded {} ({:.1}s, {})",
        filename, upload.duration_seconds, upload.format
    );

    orchestrator.submit_job(&job_id).await?;
    println!("Job submitted: {job_id}");

    if !args.wait {
        println!("Track it with: khosq status {job_id}");
        return Ok(());
    }

    // Poll until terminal; a worker must be running elsewhere
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        let status = orchestrator.get_status(&job_id).await?;

        match JobStatus::parse(&status.status) {
            Some(JobStatus::Completed) => {
                println!("Completed.");
                if let Some(result) = orchestrator.get_result(&job_id).await? {
                    if let Some(text) = result.get("full_text").and_then(|t| t.as_str()) {
                        println!("{text}");
                    }
                }
                return Ok(());
            }
            Some(JobStatus::Failed) => {
                bail!(
                    "job failed ({}): {}",
                    status.error_code.unwrap_or_else(|| "unknown".to_string()),
                    status
                        .error_message
                        .unwrap_or_else(|| "no error message".to_string())
                );
            }
            Some(JobStatus::Cancelled) => bail!("job was cancelled"),
            _ => {
                println!(
                    "  {} — {}/{} chunks ({:.1}%)",
                    status.status,
                    status.completed_chunks,
                    status.total_chunks,
                    status.progress_percent
                );
            }
        }
    }
}
