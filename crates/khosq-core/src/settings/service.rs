//! Storage, database, janitor, logging and upload-limit configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Blob store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Root directory for the filesystem blob store.
    pub root: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("khosq")
                .join("blobs"),
        }
    }
}

/// Job store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite connection string, e.g. `sqlite:///var/lib/khosq/khosq.db`.
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        let path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("khosq")
            .join("khosq.db");
        Self {
            url: format!("sqlite://{}?mode=rwc", path.display()),
        }
    }
}

/// Retention and stale-job sweeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JanitorSettings {
    /// Terminal jobs older than this are evicted. `<= 0` disables eviction.
    pub retention_days: i64,
    /// In-flight jobs untouched for this long are failed at startup.
    pub stale_minutes: i64,
}

impl Default for JanitorSettings {
    fn default() -> Self {
        Self {
            retention_days: 30,
            stale_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Console,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, e.g. `info` or `khosq_core=debug`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Console,
        }
    }
}

/// Upload validation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    pub max_upload_bytes: u64,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: 500 * 1024 * 1024,
        }
    }
}
