//! HiSpeech transcription provider - Armenian-optimized speech recognition
//!
//! Synchronous upload endpoint (`wait_for_result=true`). Field names vary
//! between API revisions, so the parser accepts the common aliases for
//! segments and text.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::base::{audio_file_part, error_from_response, latency_ms};
use super::error::ProviderError;
use super::{realign_segments, Segment, SpeechBackend, TranscriptionRequest, TranscriptionResponse};
use crate::settings::HiSpeechSettings;

#[derive(Deserialize)]
struct HiSpeechResponse {
    #[serde(default)]
    segments: Vec<HiSpeechSegment>,
    #[serde(default)]
    utterances: Vec<HiSpeechSegment>,
    text: Option<String>,
    transcript: Option<String>,
    transcription: Option<String>,
    language: Option<String>,
    detected_language: Option<String>,
    duration: Option<f64>,
}

#[derive(Deserialize)]
struct HiSpeechSegment {
    text: Option<String>,
    transcript: Option<String>,
    start: Option<f64>,
    start_time: Option<f64>,
    end: Option<f64>,
    end_time: Option<f64>,
    speaker: Option<String>,
    speaker_id: Option<String>,
    confidence: Option<f64>,
}

/// HiSpeech Armenian-optimized STT provider
pub struct HiSpeechProvider {
    settings: HiSpeechSettings,
}

impl HiSpeechProvider {
    pub fn new(settings: HiSpeechSettings) -> Self {
        Self { settings }
    }

    fn parse_response(
        &self,
        result: HiSpeechResponse,
        request: &TranscriptionRequest,
    ) -> TranscriptionResponse {
        let raw_segments = if !result.segments.is_empty() {
            result.segments
        } else {
            result.utterances
        };

        let mut segments: Vec<Segment> = raw_segments
            .into_iter()
            .map(|seg| Segment {
                text: seg.text.or(seg.transcript).unwrap_or_default(),
                start_time: seg.start.or(seg.start_time).unwrap_or(0.0),
                end_time: seg.end.or(seg.end_time).unwrap_or(0.0),
                speaker_id: seg.speaker.or(seg.speaker_id),
                confidence: seg.confidence,
                words: None,
            })
            .collect();

        let mut full_text = result
            .text
            .or(result.transcript)
            .or(result.transcription)
            .unwrap_or_default();

        if full_text.is_empty() && !segments.is_empty() {
            full_text = segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
        }

        // Text but no segments: degrade to one whole-clip segment
        if segments.is_empty() && !full_text.is_empty() {
            segments.push(Segment {
                text: full_text.clone(),
                start_time: 0.0,
                end_time: result.duration.unwrap_or(request.audio_duration),
                speaker_id: Some("SPEAKER_00".to_string()),
                confidence: None,
                words: None,
            });
        }

        realign_segments(&mut segments, request.audio_duration);

        let mut metadata = serde_json::Map::new();
        metadata.insert("provider".to_string(), json!("hispeech"));

        TranscriptionResponse {
            text: full_text,
            segments,
            language_detected: result
                .language
                .or(result.detected_language)
                .or_else(|| Some("hy".to_string())),
            metadata,
        }
    }
}

#[async_trait]
impl SpeechBackend for HiSpeechProvider {
    fn name(&self) -> &'static str {
        "hispeech"
    }

    fn display_name(&self) -> &'static str {
        "HiSpeech"
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

        let form = reqwest::multipart::Form::new()
            .part("file", audio_file_part(self.name(), audio_data, request)?)
            .text("wait_for_result", "true");

        let started = std::time::Instant::now();
        let response = client
            .post(format!(
                "{}/api/v1/transcriptions/upload",
                self.settings.api_url
            ))
            .header("x-auth-token", &self.settings.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(self.name(), e))?;

        if !response.status().is_success() {
            return Err(error_from_response(self.name(), response).await);
        }

        let elapsed_ms = latency_ms(started);
        let parsed: HiSpeechResponse = response
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
