//! Speech-to-Text Provider Module
//!
//! Extensible architecture for vendor adapters. All providers implement the
//! `SpeechBackend` trait and are registered in a static registry chosen at
//! build time — no runtime plugin discovery.
//!
//! # Architecture
//!
//! ```text
//! Provider System
//!   ├── Registry     - name → adapter lookup, process singleton
//!   ├── Base         - shared HTTP helpers (status mapping, multipart)
//!   ├── Realign      - timestamp hygiene applied to every vendor response
//!   └── Providers
//!       ├── Gemini      - prompt-driven multimodal transcription
//!       ├── ElevenLabs  - Scribe API
//!       ├── OpenAI      - Whisper API (no diarization)
//!       ├── wav.am      - Armenian-optimized
//!       └── HiSpeech    - Armenian-optimized
//! ```
//!
//! # Adapter obligations
//!
//! Every adapter maps vendor idiosyncrasies onto one canonical shape:
//!
//! - HTTP 429 / quota exhaustion → [`ProviderError::RateLimited`] with the
//!   vendor's `Retry-After` when available.
//! - 5xx, connection failures and timeouts → retryable errors.
//! - Auth, invalid input and policy refusals → fatal errors.
//! - Segment timestamps are re-aligned into `[0, audio_duration]` before
//!   returning (see [`realign_segments`]); the merger assumes this.
//! - Parse fallbacks (degraded single-segment output) are tagged in
//!   `metadata` so the merger can raise a warning.
//!
//! # Adding a New Provider
//!
//! 1. Create a new file in `provider/` (e.g. `myvendor.rs`)
//! 2. Implement `SpeechBackend`
//! 3. Add a variant to `SttProvider` in `config.rs`
//! 4. Register it in `ProviderRegistry::new()`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

mod base;
mod elevenlabs;
pub mod error;
mod gemini;
mod hispeech;
mod openai;
mod realign;
mod wav_am;

pub use elevenlabs::ElevenLabsProvider;
pub use error::ProviderError;
pub use gemini::GeminiProvider;
pub use hispeech::HiSpeechProvider;
pub use openai::OpenAIProvider;
pub use realign::realign_segments;
pub use wav_am::WavAmProvider;

use crate::config::SttProvider;
use crate::settings::ProviderSettings;

/// Default timeout for provider API requests (5 minutes)
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// A single word with timing, when the vendor returns word-level detail.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WordSpan {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
}

/// One transcribed segment, timestamps relative to the submitted clip.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Segment {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordSpan>>,
}

/// Canonical response shape every adapter produces.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TranscriptionResponse {
    /// Full transcript text of the clip.
    pub text: String,
    pub segments: Vec<Segment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_detected: Option<String>,
    /// Provider forensics: model, latency, token counts, finish/fallback
    /// tags. Free-form so each vendor can record what it has.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Timestamp detail requested from the vendor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimestampGranularity {
    #[default]
    Segment,
    Word,
}

/// Everything a provider call needs beyond the audio bytes.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// Primary language (ISO 639-1), "auto" for detection.
    pub language: String,
    /// Languages the audio may code-switch into.
    pub additional_languages: Vec<String>,
    /// Free-form caller prompt.
    pub prompt: Option<String>,
    pub custom_vocabulary: Vec<String>,
    pub domain: Option<String>,

    // Context carry for multi-chunk jobs
    /// Trailing transcript of earlier chunks, one `SPEAKER_XX: text` line
    /// per segment. Only set when `chunk_index > 0`.
    pub previous_transcript_context: Option<String>,
    /// Speaker IDs already assigned in earlier chunks.
    pub previous_speakers: Vec<String>,
    pub chunk_index: usize,

    pub diarization_enabled: bool,
    pub min_speakers: Option<u32>,
    pub max_speakers: Option<u32>,

    pub include_timestamps: bool,
    pub timestamp_granularity: TimestampGranularity,
    pub include_confidence: bool,

    /// Duration of this clip in seconds; adapters use it for timestamp
    /// re-alignment and whole-clip segments.
    pub audio_duration: f64,
    /// Container extension of the uploaded bytes ("wav", "mp3", ...).
    pub audio_format: String,
}

impl Default for TranscriptionRequest {
    fn default() -> Self {
        Self {
            language: "hy".to_string(),
            additional_languages: vec!["en".to_string(), "ru".to_string()],
            prompt: None,
            custom_vocabulary: Vec::new(),
            domain: None,
            previous_transcript_context: None,
            previous_speakers: Vec::new(),
            chunk_index: 0,
            diarization_enabled: true,
            min_speakers: None,
            max_speakers: None,
            include_timestamps: true,
            timestamp_granularity: TimestampGranularity::Segment,
            include_confidence: false,
            audio_duration: 0.0,
            audio_format: "wav".to_string(),
        }
    }
}

impl TranscriptionRequest {
    /// MIME type for the audio bytes.
    pub fn mime_type(&self) -> String {
        match self.audio_format.as_str() {
            "mp3" => "audio/mpeg".to_string(),
            other => format!("audio/{other}"),
        }
    }

    /// Language hint to send to the vendor, None for auto-detection.
    pub fn language_hint(&self) -> Option<&str> {
        if self.language.is_empty() || self.language.eq_ignore_ascii_case("auto") {
            None
        } else {
            Some(&self.language)
        }
    }

    /// Plain-text hint block shared by prompt-less vendors: caller prompt,
    /// domain, vocabulary and expected language mix.
    pub fn build_hint_text(&self) -> String {
        let mut parts = Vec::new();

        if let Some(prompt) = &self.prompt {
            parts.push(prompt.clone());
        }

        if let Some(domain) = &self.domain {
            parts.push(format!("Domain: {domain}"));
        }

        if !self.custom_vocabulary.is_empty() {
            parts.push(format!("Custom terms: {}", self.custom_vocabulary.join(", ")));
        }

        if !self.additional_languages.is_empty() {
            parts.push(format!(
                "The audio may contain mixed languages: {} (primary), {}",
                self.language,
                self.additional_languages.join(", ")
            ));
        }

        parts.join(". ")
    }
}

/// Trait for transcription providers.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Unique identifier (e.g. "gemini", "wav-am")
    fn name(&self) -> &'static str;

    /// Display name for operator output
    fn display_name(&self) -> &'static str;

    /// Whether the vendor handles a given ISO 639-1 language.
    fn supports_language(&self, language: &str) -> bool {
        matches!(language, "hy" | "en" | "ru")
    }

    /// Whether the vendor labels speakers.
    fn supports_diarization(&self) -> bool {
        true
    }

    /// Transcribe one audio clip.
    async fn transcribe(
        &self,
        client: &reqwest::Client,
        audio_data: Vec<u8>,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionResponse, ProviderError>;
}

/// Registry of all available transcription providers.
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn SpeechBackend>>,
}

impl ProviderRegistry {
    /// Create the registry with all built-in providers.
    pub fn new(settings: &ProviderSettings) -> Self {
        let mut providers: HashMap<&'static str, Arc<dyn SpeechBackend>> = HashMap::new();

        providers.insert("gemini", Arc::new(GeminiProvider::new(settings.gemini.clone())));
        providers.insert(
            "elevenlabs",
            Arc::new(ElevenLabsProvider::new(settings.elevenlabs.clone())),
        );
        providers.insert("openai", Arc::new(OpenAIProvider::new(settings.openai.clone())));
        providers.insert("wav-am", Arc::new(WavAmProvider::new(settings.wav_am.clone())));
        providers.insert(
            "hispeech",
            Arc::new(HiSpeechProvider::new(settings.hispeech.clone())),
        );

        Self { providers }
    }

    /// Get a provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn SpeechBackend>> {
        self.providers.get(name).cloned()
    }

    /// List all provider names.
    pub fn list(&self) -> Vec<&'static str> {
        self.providers.keys().copied().collect()
    }

    /// Get the adapter for an [`SttProvider`] value.
    pub fn get_by_kind(&self, kind: SttProvider) -> Result<Arc<dyn SpeechBackend>, ProviderError> {
        self.get(kind.as_str())
            .ok_or_else(|| ProviderError::NotFound(kind.as_str().to_string()))
    }
}

static REGISTRY: OnceLock<ProviderRegistry> = OnceLock::new();

/// Initialize the process-wide registry with vendor settings.
///
/// The first call wins; later calls return the existing registry.
pub fn init_registry(settings: &ProviderSettings) -> &'static ProviderRegistry {
    REGISTRY.get_or_init(|| ProviderRegistry::new(settings))
}

/// Get the process-wide registry, initializing with defaults if needed.
pub fn registry() -> &'static ProviderRegistry {
    REGISTRY.get_or_init(|| ProviderRegistry::new(&ProviderSettings::default()))
}
