//! wav.am transcription provider - Armenian-optimized speech recognition
//!
//! wav.am groups uploads under named projects, so the adapter resolves (or
//! creates) its project once and caches the id. Responses carry no
//! timestamps: each speaker turn is reported as text only, so segments span
//! the whole clip.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::info;

use super::base::{audio_file_part, error_from_response, latency_ms};
use super::error::ProviderError;
use super::{Segment, SpeechBackend, TranscriptionRequest, TranscriptionResponse};
use crate::settings::WavAmSettings;

#[derive(Deserialize)]
struct ProjectEntry {
    id: serde_json::Value,
    name: Option<String>,
}

// The transcription endpoint returns either a list of speaker turns, a
// bare string, or an object with a text field.
#[derive(Deserialize)]
#[serde(untagged)]
enum WavAmResponse {
    Turns(Vec<SpeakerTurn>),
    Text(String),
    Object { text: Option<String> },
}

#[derive(Deserialize)]
struct SpeakerTurn {
    speaker: Option<String>,
    #[serde(default)]
    text: String,
}

/// wav.am Armenian-optimized STT provider
pub struct WavAmProvider {
    settings: WavAmSettings,
    // Project id resolved on first use and reused for the process lifetime
    project_id: Mutex<Option<String>>,
}

impl WavAmProvider {
    pub fn new(settings: WavAmSettings) -> Self {
        Self {
            settings,
            project_id: Mutex::new(None),
        }
    }

    /// Get or create the vendor-side project, caching the id.
    async fn ensure_project(&self, client: &reqwest::Client) -> Result<String, ProviderError> {
        let mut cached = self.project_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        // Look for an existing project by name
        let response = client
            .post(format!("{}/get_projects/", self.settings.api_url))
            .header("Authorization", &self.settings.api_key)
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(self.name(), e))?;

        if response.status().is_success()
            && let Ok(projects) = response.json::<Vec<ProjectEntry>>().await
        {
            for project in projects {
                if project.name.as_deref() == Some(self.settings.project_name.as_str()) {
                    let id = stringify_id(&project.id);
                    info!(project_id = %id, name = %self.settings.project_name, "found existing wav.am project");
                    *cached = Some(id.clone());
                    return Ok(id);
                }
            }
        }

        // Project not found, create it
        let response = client
            .post(format!("{}/add_project/", self.settings.api_url))
            .header("Authorization", &self.settings.api_key)
            .json(&json!({ "name": self.settings.project_name }))
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(self.name(), e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::rejected(
                self.name(),
                format!("add_project failed ({status}): {body}"),
            ));
        }

        // The API returns either a raw integer id or an object
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(self.name(), e.to_string()))?;
        let id = match &value {
            serde_json::Value::Number(_) | serde_json::Value::String(_) => stringify_id(&value),
            serde_json::Value::Object(map) => map
                .get("project_id")
                .or_else(|| map.get("id"))
                .map(stringify_id)
                .unwrap_or_else(|| value.to_string()),
            _ => value.to_string(),
        };

        info!(project_id = %id, name = %self.settings.project_name, "created wav.am project");
        *cached = Some(id.clone());
        Ok(id)
    }

    fn parse_response(
        &self,
        result: WavAmResponse,
        request: &TranscriptionRequest,
    ) -> TranscriptionResponse {
        let chunk_duration = request.audio_duration.max(0.1);
        let mut segments = Vec::new();
        let full_text;

        match result {
            WavAmResponse::Turns(turns) => {
                let texts: Vec<&str> = turns
                    .iter()
                    .filter(|t| !t.text.is_empty())
                    .map(|t| t.text.as_str())
                    .collect();
                full_text = texts.join(" ");
                for turn in &turns {
                    if turn.text.is_empty() {
                        continue;
                    }
                    segments.push(Segment {
                        text: turn.text.clone(),
                        start_time: 0.0,
                        end_time: chunk_duration,
                        speaker_id: Some(
                            turn.speaker.clone().unwrap_or_else(|| "speaker_0".to_string()),
                        ),
                        confidence: None,
                        words: None,
                    });
                }
            }
            WavAmResponse::Text(text) | WavAmResponse::Object { text: Some(text) } => {
                full_text = text.clone();
                if !text.is_empty() {
                    segments.push(Segment {
                        text,
                        start_time: 0.0,
                        end_time: chunk_duration,
                        speaker_id: Some("speaker_0".to_string()),
                        confidence: None,
                        words: None,
                    });
                }
            }
            WavAmResponse::Object { text: None } => {
                full_text = String::new();
            }
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert("provider".to_string(), json!("wav-am"));

        TranscriptionResponse {
            text: full_text,
            segments,
            language_detected: Some(
                request.language_hint().unwrap_or("hy").to_string(),
            ),
            metadata,
        }
    }
}

#[async_trait]
impl SpeechBackend for WavAmProvider {
    fn name(&self) -> &'static str {
        "wav-am"
    }

    fn display_name(&self) -> &'static str {
        "wav.am"
    }

    async fn transcribe(
        &self,
        client: &reqwest::Client,
        audio_data: Vec<u8>,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionResponse, ProviderError> {
        if self.settings.api_key.is_empty() {
            return Err(ProviderError::missing_api_key(self.display_name()));
        }

        let project_id = self.ensure_project(client).await?;

        // wav.am needs a concrete language code, never "auto"
        let language = request.language_hint().unwrap_or("hy");
        let num_speakers = request.max_speakers.unwrap_or(1);

        let form = reqwest::multipart::Form::new()
            .part(
                "audio_file",
                audio_file_part(self.name(), audio_data, request)?,
            )
            .text("project_id", project_id)
            .text("language", language.to_string())
            .text("num_speakers", num_speakers.to_string());

        let started = std::time::Instant::now();
        let response = client
            .post(format!("{}/transcribe_audio/", self.settings.api_url))
            .header("Authorization", &self.settings.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(self.name(), e))?;

        let status = response.status();
        if !status.is_success() {
            // This particular 500 is permanent for some files
            if status.as_u16() == 500 {
                let body = response.text().await.unwrap_or_default();
                if body.contains("Failed to transcribe audio") {
                    return Err(ProviderError::rejected(
                        self.name(),
                        format!("API error (500): {body}"),
                    ));
                }
                return Err(ProviderError::unavailable(
                    self.name(),
                    format!("API error (500): {body}"),
                ));
            }
            return Err(error_from_response(self.name(), response).await);
        }

        let elapsed_ms = latency_ms(started);
        let parsed: WavAmResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(self.name(), e.to_string()))?;

        let mut outcome = self.parse_response(parsed, request);
        outcome
            .metadata
            .insert("latency_ms".to_string(), json!(elapsed_ms));
        Ok(outcome)
    }
}

fn stringify_id(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
