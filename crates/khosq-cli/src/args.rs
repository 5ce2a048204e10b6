//! Command-line argument definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "khosq",
    version,
    about = "Transcription pipeline for long Armenian-primary recordings",
    long_about = "Splits long recordings into overlapping chunks, transcribes them \
                  through a cloud STT vendor with adaptive rate limiting, and stitches \
                  the results into one diarized transcript."
)]
pub struct Cli {
    /// Path to a settings file (default: ~/.config/khosq/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct SubmitArgs {
    /// Media file to transcribe (audio, or video to demux)
    pub file: PathBuf,

    /// STT vendor: gemini, elevenlabs, openai, wav-am, hispeech
    #[arg(long, default_value = "gemini")]
    pub provider: String,

    /// Primary language (ISO 639-1), "auto" to detect
    #[arg(long, default_value = "hy")]
    pub language: String,

    /// Free-form context prompt passed to the vendor
    #[arg(long)]
    pub prompt: Option<String>,

    /// Domain tag (e.g. "medical", "tech interview")
    #[arg(long)]
    pub domain: Option<String>,

    /// Custom vocabulary terms (repeatable)
    #[arg(long = "term")]
    pub vocabulary: Vec<String>,

    /// Disable speaker diarization
    #[arg(long)]
    pub no_diarization: bool,

    /// Upper bound on the number of speakers
    #[arg(long)]
    pub max_speakers: Option<u32>,

    /// Webhook URL notified when the job finishes
    #[arg(long)]
    pub webhook: Option<String>,

    /// Block until the job reaches a terminal state
    #[arg(long)]
    pub wait: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a media file for transcription
    Submit(SubmitArgs),

    /// Show a job's status and progress counters
    Status { job_id: String },

    /// Show detailed per-chunk progress
    Progress { job_id: String },

    /// Print (or save) the merged transcript of a completed job
    Result {
        job_id: String,
        /// Write the transcript JSON here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List jobs, newest first
    Jobs {
        /// Filter by status (pending, uploaded, processing, completed, failed, cancelled)
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Retry a failed job from its last checkpoint
    Retry { job_id: String },

    /// Cancel a running job at its next retry checkpoint
    Cancel { job_id: String },

    /// Delete a job, its chunks and all stored artifacts
    Delete { job_id: String },

    /// Run the worker: startup recovery, then the transcription and
    /// webhook queue loops plus the retention janitor
    Worker,

    /// Run one retention sweep and exit
    Janitor,

    /// Show the resolved configuration
    Config {
        /// Print only the settings file path
        #[arg(long)]
        path: bool,
    },
}
