//! Per-vendor API keys, endpoints and rate limits.

use serde::{Deserialize, Serialize};

use crate::config::SttProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub rpm_limit: u32,
    /// Token budget for the generation response.
    pub max_output_tokens: u32,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            rpm_limit: 60,
            max_output_tokens: 16384,
            request_timeout_secs: 180,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScribeSettings {
    pub api_key: String,
    pub rpm_limit: u32,
}

impl Default for ScribeSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            rpm_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAISettings {
    pub api_key: String,
    pub model: String,
    pub rpm_limit: u32,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "whisper-1".to_string(),
            rpm_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WavAmSettings {
    pub api_key: String,
    pub api_url: String,
    /// Uploads are grouped under a named project on the vendor side.
    pub project_name: String,
    pub rpm_limit: u32,
}

impl Default for WavAmSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: "https://api.wav.am".to_string(),
            project_name: "khosq".to_string(),
            rpm_limit: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HiSpeechSettings {
    pub api_key: String,
    pub api_url: String,
    pub rpm_limit: u32,
}

impl Default for HiSpeechSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: "https://api.hispeech.ai".to_string(),
            rpm_limit: 60,
        }
    }
}

/// All vendor configuration in one place.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderSettings {
    pub gemini: GeminiSettings,
    pub elevenlabs: ScribeSettings,
    pub openai: OpenAISettings,
    pub wav_am: WavAmSettings,
    pub hispeech: HiSpeechSettings,
}

impl ProviderSettings {
    /// API key for a provider, empty string when unconfigured.
    pub fn api_key_for(&self, provider: SttProvider) -> &str {
        match provider {
            SttProvider::Gemini => &self.gemini.api_key,
            SttProvider::ElevenLabs => &self.elevenlabs.api_key,
            SttProvider::OpenAI => &self.openai.api_key,
            SttProvider::WavAm => &self.wav_am.api_key,
            SttProvider::HiSpeech => &self.hispeech.api_key,
        }
    }

    /// Configured requests-per-minute budget for a provider.
    pub fn rpm_limit_for(&self, provider: SttProvider) -> u32 {
        match provider {
            SttProvider::Gemini => self.gemini.rpm_limit,
            SttProvider::ElevenLabs => self.elevenlabs.rpm_limit,
            SttProvider::OpenAI => self.openai.rpm_limit,
            SttProvider::WavAm => self.wav_am.rpm_limit,
            SttProvider::HiSpeech => self.hispeech.rpm_limit,
        }
    }

    /// Overlay API keys from the environment; env wins over the file.
    pub fn apply_env_overrides(&mut self) {
        for provider in SttProvider::all() {
            if let Ok(key) = std::env::var(provider.api_key_env_var())
                && !key.is_empty()
            {
                match provider {
                    SttProvider::Gemini => self.gemini.api_key = key,
                    SttProvider::ElevenLabs => self.elevenlabs.api_key = key,
                    SttProvider::OpenAI => self.openai.api_key = key,
                    SttProvider::WavAm => self.wav_am.api_key = key,
                    SttProvider::HiSpeech => self.hispeech.api_key = key,
                }
            }
        }
    }
}
