//! OpenAI Whisper transcription provider
//!
//! Whisper has no diarization; every segment is attributed to SPEAKER_00
//! and the merger's renormalization keeps it that way. Word timestamps are
//! matched back to their segment by time span when requested.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::base::{audio_file_part, error_from_response, latency_ms};
use super::error::ProviderError;
use super::{
    realign_segments, Segment, SpeechBackend, TimestampGranularity, TranscriptionRequest,
    TranscriptionResponse, WordSpan,
};
use crate::settings::OpenAISettings;

const API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

#[derive(Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
    language: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    #[serde(default)]
    words: Vec<WhisperWord>,
}

#[derive(Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    avg_logprob: Option<f64>,
}

#[derive(Deserialize)]
struct WhisperWord {
    #[serde(default)]
    word: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
}

/// OpenAI Whisper transcription provider
pub struct OpenAIProvider {
    settings: OpenAISettings,
}

impl OpenAIProvider {
    pub fn new(settings: OpenAISettings) -> Self {
        Self { settings }
    }

    fn parse_response(
        &self,
        result: WhisperResponse,
        request: &TranscriptionRequest,
    ) -> TranscriptionResponse {
        let want_words = request.timestamp_granularity == TimestampGranularity::Word;

        let mut segments: Vec<Segment> = result
            .segments
            .iter()
            .map(|seg| {
                let words = if want_words && !result.words.is_empty() {
                    let matched: Vec<WordSpan> = result
                        .words
                        .iter()
                        .filter(|w| w.start >= seg.start && w.end <= seg.end)
                        .map(|w| WordSpan {
                            text: w.word.clone(),
                            start_time: w.start,
                            end_time: w.end,
                        })
                        .collect();
                    (!matched.is_empty()).then_some(matched)
                } else {
                    None
                };

                Segment {
                    text: seg.text.trim().to_string(),
                    start_time: seg.start,
                    end_time: seg.end,
                    // Whisper doesn't label speakers
                    speaker_id: Some("SPEAKER_00".to_string()),
                    confidence: seg.avg_logprob,
                    words,
                }
            })
            .collect();

        realign_segments(&mut segments, request.audio_duration);

        let mut metadata = serde_json::Map::new();
        metadata.insert("model".to_string(), json!(self.settings.model));
        if let Some(duration) = result.duration {
            metadata.insert("reported_duration".to_string(), json!(duration));
        }

        TranscriptionResponse {
            text: result.text.trim().to_string(),
            segments,
            language_detected: result.language,
            metadata,
        }
    }
}

#[async_trait]
impl SpeechBackend for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn display_name(&self) -> &'static str {
        "OpenAI Whisper"
    }

    fn supports_language(&self, _language: &str) -> bool {
        // Whisper covers 99 languages including Armenian
        true
    }

    fn supports_diarization(&self) -> bool {
        false
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

        let mut form = reqwest::multipart::Form::new()
            .part("file", audio_file_part(self.name(), audio_data, request)?)
            .text("model", self.settings.model.clone())
            .text("response_format", "verbose_json");

        if let Some(lang) = request.language_hint() {
            form = form.text("language", lang.to_string());
        }

        let hint = request.build_hint_text();
        if !hint.is_empty() {
            form = form.text("prompt", hint);
        }

        if request.timestamp_granularity == TimestampGranularity::Word {
            form = form
                .text("timestamp_granularities[]", "word")
                .text("timestamp_granularities[]", "segment");
        }

        let started = std::time::Instant::now();
        let response = client
            .post(API_URL)
            .bearer_auth(&self.settings.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(self.name(), e))?;

        if !response.status().is_success() {
            return Err(error_from_response(self.name(), response).await);
        }

        let elapsed_ms = latency_ms(started);
        let parsed: WhisperResponse = response
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_get_speaker_zero() {
        let provider = OpenAIProvider::new(OpenAISettings::default());
        let raw = WhisperResponse {
            text: " Hello world. ".to_string(),
            language: Some("en".to_string()),
            duration: Some(4.2),
            segments: vec![WhisperSegment {
                text: " Hello world. ".to_string(),
                start: 0.0,
                end: 4.2,
                avg_logprob: Some(-0.21),
            }],
            words: vec![],
        };

        let request = TranscriptionRequest {
            audio_duration: 4.2,
            ..Default::default()
        };
        let outcome = provider.parse_response(raw, &request);

        assert_eq!(outcome.text, "Hello world.");
        assert_eq!(outcome.segments[0].speaker_id.as_deref(), Some("SPEAKER_00"));
        assert_eq!(outcome.segments[0].confidence, Some(-0.21));
    }

    #[test]
    fn words_are_matched_to_segments_by_span() {
        let provider = OpenAIProvider::new(OpenAISettings::default());
        let raw = WhisperResponse {
            text: "a b".to_string(),
            language: None,
            duration: None,
            segments: vec![
                WhisperSegment {
                    text: "a".to_string(),
                    start: 0.0,
                    end: 1.0,
                    avg_logprob: None,
                },
                WhisperSegment {
                    text: "b".to_string(),
                    start: 1.0,
                    end: 2.0,
                    avg_logprob: None,
                },
            ],
            words: vec![
                WhisperWord {
                    word: "a".to_string(),
                    start: 0.1,
                    end: 0.6,
                },
                WhisperWord {
                    word: "b".to_string(),
                    start: 1.1,
                    end: 1.9,
                },
            ],
        };

        let request = TranscriptionRequest {
            audio_duration: 2.0,
            timestamp_granularity: TimestampGranularity::Word,
            ..Default::default()
        };
        let outcome = provider.parse_response(raw, &request);

        assert_eq!(outcome.segments[0].words.as_ref().unwrap()[0].text, "a");
        assert_eq!(outcome.segments[1].words.as_ref().unwrap()[0].text, "b");
    }

    #[test]
    fn no_diarization_support() {
        let provider = OpenAIProvider::new(OpenAISettings::default());
        assert!(!provider.supports_diarization());
    }
}
