//! Transcription provider selection.
//!
//! Defines the closed set of speech-to-text vendors khosq can route a job
//! through. The registry is fixed at build time; there is no runtime plugin
//! discovery.
//!
//! # Providers
//!
//! - **Gemini** - multimodal prompt-driven transcription, best diarization
//!   for Armenian-primary audio
//! - **ElevenLabs** - Scribe API, word-level timestamps
//! - **OpenAI** - Whisper API, no diarization
//! - **WavAm** - wav.am, Armenian-optimized
//! - **HiSpeech** - hispeech.ai, Armenian-optimized

use serde::{Deserialize, Serialize};
use std::fmt;

/// Available transcription providers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SttProvider {
    Gemini,
    ElevenLabs,
    OpenAI,
    #[serde(rename = "wav-am")]
    WavAm,
    HiSpeech,
}

impl Default for SttProvider {
    fn default() -> Self {
        SttProvider::Gemini
    }
}

impl SttProvider {
    /// Get the string identifier for this provider
    pub fn as_str(&self) -> &'static str {
        match self {
            SttProvider::Gemini => "gemini",
            SttProvider::ElevenLabs => "elevenlabs",
            SttProvider::OpenAI => "openai",
            SttProvider::WavAm => "wav-am",
            SttProvider::HiSpeech => "hispeech",
        }
    }

    /// Human-readable display name for this provider
    pub fn display_name(&self) -> &'static str {
        match self {
            SttProvider::Gemini => "Google Gemini",
            SttProvider::ElevenLabs => "ElevenLabs Scribe",
            SttProvider::OpenAI => "OpenAI Whisper",
            SttProvider::WavAm => "wav.am",
            SttProvider::HiSpeech => "HiSpeech",
        }
    }

    /// Get the environment variable name for this provider's API key
    pub fn api_key_env_var(&self) -> &'static str {
        match self {
            SttProvider::Gemini => "GEMINI_API_KEY",
            SttProvider::ElevenLabs => "ELEVENLABS_API_KEY",
            SttProvider::OpenAI => "OPENAI_API_KEY",
            SttProvider::WavAm => "WAV_AM_API_KEY",
            SttProvider::HiSpeech => "HISPEECH_API_KEY",
        }
    }

    /// List all available providers (ordered by recommendation for
    /// Armenian-primary audio)
    pub fn all() -> &'static [SttProvider] {
        &[
            SttProvider::Gemini,
            SttProvider::WavAm,
            SttProvider::HiSpeech,
            SttProvider::ElevenLabs,
            SttProvider::OpenAI,
        ]
    }
}

impl fmt::Display for SttProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SttProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(SttProvider::Gemini),
            "elevenlabs" => Ok(SttProvider::ElevenLabs),
            "openai" | "whisper" => Ok(SttProvider::OpenAI),
            "wav-am" | "wavam" | "wav" => Ok(SttProvider::WavAm),
            "hispeech" => Ok(SttProvider::HiSpeech),
            _ => Err(format!(
                "Unknown provider: {}. Available: gemini, elevenlabs, openai, wav-am, hispeech",
                s
            )),
        }
    }
}
