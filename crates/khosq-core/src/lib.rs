//! khosq-core — transcription pipeline for long Armenian-primary recordings
//!
//! Ingests long audio (or video) recordings, splits them into bounded
//! overlapping chunks, transcribes each chunk through an external STT
//! vendor with adaptive rate limiting and retries, and stitches the
//! per-chunk results into a single diarized transcript.
//!
//! ```text
//! orchestrator ──▶ queue ──▶ worker
//!                              ├── media (probe / extract / chunk)
//!                              ├── provider (vendor adapters) + retry + ratelimit
//!                              └── merger ──▶ blob store + job store
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod http;
pub mod job;
pub mod logging;
pub mod media;
pub mod merger;
pub mod orchestrator;
pub mod provider;
pub mod ratelimit;
pub mod recovery;
pub mod retry;
pub mod settings;
pub mod store;
pub mod worker;

pub use config::SttProvider;
pub use error::{CoreError, MediaError, ProviderError, Result};
pub use job::{ChunkRecord, ChunkStatus, JobConfig, JobRecord, JobStatus};
pub use merger::{MergedTranscript, TranscriptMerger};
pub use orchestrator::Orchestrator;
pub use recovery::{recover_stale_jobs, Janitor};
pub use settings::Settings;
pub use worker::JobWorker;
