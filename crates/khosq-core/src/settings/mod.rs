//! Service Settings Module
//!
//! Hierarchical settings organized by concern:
//!
//! ```text
//! Settings (Aggregate Root)
//!   ├── Chunking   - chunk duration, overlap, context carry
//!   ├── Retry      - backoff policy for provider calls
//!   ├── Providers  - per-vendor API keys, endpoints, rpm limits
//!   ├── Storage    - blob store root directory
//!   ├── Database   - SQLite connection string
//!   ├── Janitor    - retention and stale-job sweeping
//!   ├── Logging    - level and output format
//!   └── Limits     - upload size and format whitelist
//! ```
//!
//! Settings are stored at `~/.config/khosq/settings.json` with 0600
//! permissions to protect API keys. API keys may also come from the
//! environment (`GEMINI_API_KEY` etc.), which takes precedence over the
//! file.

mod chunking;
mod providers;
mod service;

pub use chunking::{ChunkingSettings, DEFAULT_OVERLAP_SECS, DEFAULT_SIMILARITY_THRESHOLD};
pub use providers::{
    GeminiSettings, HiSpeechSettings, OpenAISettings, ProviderSettings, ScribeSettings,
    WavAmSettings,
};
pub use service::{
    DatabaseSettings, JanitorSettings, LimitSettings, LogFormat, LoggingSettings, StorageSettings,
};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::retry::RetryPolicy;

/// Service settings (aggregate root).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingSettings,
    pub retry: RetryPolicy,
    pub providers: ProviderSettings,
    pub storage: StorageSettings,
    pub database: DatabaseSettings,
    pub janitor: JanitorSettings,
    pub logging: LoggingSettings,
    pub limits: LimitSettings,
}

impl Settings {
    /// Get the default settings file path (~/.config/khosq/settings.json).
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("khosq")
            .join("settings.json")
    }

    /// Load settings from the default path.
    ///
    /// Returns default settings if the file doesn't exist or cannot be
    /// parsed. Environment API-key overrides are applied in both cases.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load settings from an explicit path.
    pub fn load_from(path: &Path) -> Self {
        let mut settings = if let Ok(content) = fs::read_to_string(path)
            && let Ok(settings) = serde_json::from_str(&content)
        {
            settings
        } else {
            Self::default()
        };
        settings.providers.apply_env_overrides();
        settings
    }

    /// Save settings to disk with 0600 permissions.
    ///
    /// On Unix, creates the file with mode 0600 from the start to avoid a
    /// window where the file is world-readable.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    /// Save settings to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        use std::io::Write;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)?;
            file.write_all(content.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, &content)?;
        }

        Ok(())
    }
}
