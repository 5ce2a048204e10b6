//! Job and chunk domain types.
//!
//! A job is one user submission; chunks are its children, one per bounded
//! audio slice. Status transitions form a DAG — no state is ever walked
//! backwards except `failed → processing` (retry) and the terminal moves
//! into `cancelled`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::SttProvider;
use crate::provider::{TimestampGranularity, TranscriptionResponse};

/// Job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Uploaded,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Uploaded => "uploaded",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "uploaded" => Some(JobStatus::Uploaded),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states are never left again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether `self → next` is a legal lifecycle move.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, Uploaded) => true,
            (Pending, Cancelled) => true,
            (Pending, Processing) => true, // submit straight from pending
            (Uploaded, Processing) => true,
            (Uploaded, Cancelled) => true,
            (Uploaded, Failed) => true, // stale sweep
            (Processing, Completed) => true,
            (Processing, Failed) => true,
            (Processing, Cancelled) => true,
            (Failed, Processing) => true, // retry
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Chunk lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ChunkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::Pending => "pending",
            ChunkStatus::Processing => "processing",
            ChunkStatus::Completed => "completed",
            ChunkStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ChunkStatus::Pending),
            "processing" => Some(ChunkStatus::Processing),
            "completed" => Some(ChunkStatus::Completed),
            "failed" => Some(ChunkStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Speaker labeling options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiarizationConfig {
    pub enabled: bool,
    pub min_speakers: Option<u32>,
    pub max_speakers: Option<u32>,
}

impl Default for DiarizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_speakers: None,
            max_speakers: None,
        }
    }
}

/// Output shaping options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub include_timestamps: bool,
    pub timestamp_granularity: TimestampGranularity,
    pub include_confidence: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            include_timestamps: true,
            timestamp_granularity: TimestampGranularity::Segment,
            include_confidence: false,
        }
    }
}

/// Caller-provided transcription context.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ContextConfig {
    pub prompt: Option<String>,
    pub domain: Option<String>,
    pub custom_vocabulary: Vec<String>,
}

/// Immutable per-job configuration, stored as JSON on the job row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Primary language (ISO 639-1).
    pub language: String,
    /// Languages the audio may code-switch into.
    pub additional_languages: Vec<String>,
    pub diarization: DiarizationConfig,
    pub output: OutputConfig,
    pub context: ContextConfig,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            language: "hy".to_string(),
            additional_languages: vec!["en".to_string(), "ru".to_string()],
            diarization: DiarizationConfig::default(),
            output: OutputConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

/// One transcription job row.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub config: JobConfig,
    pub provider: SttProvider,

    pub original_filename: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub audio_format: Option<String>,

    pub original_key: Option<String>,
    pub result_key: Option<String>,
    /// Inline copy of the merged document for quick reads.
    pub result_summary: Option<serde_json::Value>,

    pub error_message: Option<String>,
    pub error_code: Option<String>,

    pub total_chunks: i64,
    pub completed_chunks: i64,

    pub webhook_url: Option<String>,
    pub webhook_sent: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Populated only when loaded with `include_chunks`.
    pub chunks: Vec<ChunkRecord>,
}

impl JobRecord {
    /// Completion percentage derived from chunk counters.
    pub fn progress_percent(&self) -> f64 {
        if self.total_chunks <= 0 {
            return 0.0;
        }
        (self.completed_chunks as f64 / self.total_chunks as f64 * 1000.0).round() / 10.0
    }
}

/// One chunk row.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub job_id: String,
    pub chunk_index: i64,
    pub status: ChunkStatus,
    pub start_time: f64,
    pub end_time: f64,
    pub attempt_count: i64,
    pub last_error: Option<String>,
    pub result: Option<TranscriptionResponse>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl ChunkRecord {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}
