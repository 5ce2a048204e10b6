//! Structured logging setup.
//!
//! Pipeline code logs through `tracing`; the worker binds `job_id` (and
//! `chunk_index` inside the chunk loop) as span fields so every line from a
//! job is attributable without threading ids through call sites.

use tracing_subscriber::EnvFilter;

use crate::settings::{LogFormat, LoggingSettings};

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG` when set, otherwise the configured level. Safe to call
/// once per process; later calls are ignored.
pub fn init(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.clone()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = match settings.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Console => builder.try_init(),
    };

    // A second init (e.g. from tests) is not an error worth surfacing.
    let _ = result;
}
