//! ElevenLabs Scribe transcription provider
//!
//! Scribe returns either segment-level output or a flat word stream with
//! per-word speaker ids. The word stream is folded into speaker-turn
//! segments so downstream code sees one shape.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::base::{audio_file_part, error_from_response, latency_ms};
use super::error::ProviderError;
use super::{
    realign_segments, Segment, SpeechBackend, TimestampGranularity, TranscriptionRequest,
    TranscriptionResponse, WordSpan,
};
use crate::settings::ScribeSettings;

const API_URL: &str = "https://api.elevenlabs.io/v1/speech-to-text";
const MODEL_ID: &str = "scribe_v1";

#[derive(Deserialize)]
struct ScribeResponse {
    #[serde(default)]
    text: String,
    language_code: Option<String>,
    #[serde(default)]
    segments: Vec<ScribeSegment>,
    #[serde(default)]
    words: Vec<ScribeWord>,
}

#[derive(Deserialize)]
struct ScribeSegment {
    #[serde(default)]
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    speaker_id: Option<String>,
    confidence: Option<f64>,
}

#[derive(Deserialize)]
struct ScribeWord {
    #[serde(default)]
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    speaker_id: Option<String>,
}

/// ElevenLabs Scribe transcription provider
pub struct ElevenLabsProvider {
    settings: ScribeSettings,
}

impl ElevenLabsProvider {
    pub fn new(settings: ScribeSettings) -> Self {
        Self { settings }
    }

    fn parse_response(
        &self,
        result: ScribeResponse,
        request: &TranscriptionRequest,
    ) -> TranscriptionResponse {
        let mut segments: Vec<Segment> = if !result.segments.is_empty() {
            result
                .segments
                .into_iter()
                .map(|s| Segment {
                    text: s.text,
                    start_time: s.start,
                    end_time: s.end,
                    speaker_id: s.speaker_id,
                    confidence: s.confidence,
                    words: None,
                })
                .collect()
        } else {
            fold_words_into_turns(result.words)
        };

        let full_text = if result.text.is_empty() {
            segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            result.text
        };

        realign_segments(&mut segments, request.audio_duration);

        let mut metadata = serde_json::Map::new();
        metadata.insert("model".to_string(), json!(MODEL_ID));

        TranscriptionResponse {
            text: full_text,
            segments,
            language_detected: result.language_code,
            metadata,
        }
    }
}

#[async_trait]
impl SpeechBackend for ElevenLabsProvider {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    fn display_name(&self) -> &'static str {
        "ElevenLabs Scribe"
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
            .text("model_id", MODEL_ID);

        if let Some(lang) = request.language_hint() {
            form = form.text("language_code", lang.to_string());
        }

        if request.diarization_enabled {
            form = form.text("diarize", "true");
            if let Some(max) = request.max_speakers {
                form = form.text("num_speakers", max.to_string());
            }
        }

        if request.include_timestamps {
            // Scribe accepts 'none', 'word', 'character'; segment detail
            // maps to word
            let granularity = match request.timestamp_granularity {
                TimestampGranularity::Segment | TimestampGranularity::Word => "word",
            };
            form = form.text("timestamps_granularity", granularity);
        }

        let started = std::time::Instant::now();
        let response = client
            .post(API_URL)
            .header("xi-api-key", &self.settings.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(self.name(), e))?;

        if !response.status().is_success() {
            return Err(error_from_response(self.name(), response).await);
        }

        let elapsed_ms = latency_ms(started);
        let parsed: ScribeResponse = response
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

/// Fold a flat word stream into speaker-turn segments.
fn fold_words_into_turns(words: Vec<ScribeWord>) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current_speaker = "SPEAKER_00".to_string();
    let mut current_words: Vec<WordSpan> = Vec::new();
    let mut turn_start = 0.0;
    let mut turn_end = 0.0;

    let mut flush = |speaker: &str, words: &mut Vec<WordSpan>, start: f64, end: f64| {
        if words.is_empty() {
            return;
        }
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        segments.push(Segment {
            text,
            start_time: start,
            end_time: end,
            speaker_id: Some(speaker.to_string()),
            confidence: None,
            words: Some(std::mem::take(words)),
        });
    };

    for word in words {
        let speaker = word
            .speaker_id
            .clone()
            .unwrap_or_else(|| current_speaker.clone());

        if speaker != current_speaker && !current_words.is_empty() {
            flush(&current_speaker, &mut current_words, turn_start, turn_end);
            turn_start = word.start;
        }

        if current_words.is_empty() {
            turn_start = word.start;
        }

        current_speaker = speaker;
        turn_end = word.end;
        current_words.push(WordSpan {
            text: word.text,
            start_time: word.start,
            end_time: word.end,
        });
    }

    flush(&current_speaker, &mut current_words, turn_start, turn_end);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TranscriptionRequest {
        TranscriptionRequest {
            audio_duration: 10.0,
            ..Default::default()
        }
    }

    #[test]
    fn segment_response_passes_through() {
        let provider = ElevenLabsProvider::new(ScribeSettings::default());
        let raw = ScribeResponse {
            text: "hello there".to_string(),
            language_code: Some("en".to_string()),
            segments: vec![ScribeSegment {
                text: "hello there".to_string(),
                start: 0.0,
                end: 2.0,
                speaker_id: Some("speaker_0".to_string()),
                confidence: Some(0.92),
            }],
            words: vec![],
        };

        let outcome = provider.parse_response(raw, &request());
        assert_eq!(outcome.segments.len(), 1);
        assert_eq!(outcome.text, "hello there");
        assert_eq!(outcome.language_detected.as_deref(), Some("en"));
    }

    #[test]
    fn word_stream_folds_into_speaker_turns() {
        let words = vec![
            ScribeWord {
                text: "hi".to_string(),
                start: 0.0,
                end: 0.5,
                speaker_id: Some("speaker_0".to_string()),
            },
            ScribeWord {
                text: "there".to_string(),
                start: 0.5,
                end: 1.0,
                speaker_id: Some("speaker_0".to_string()),
            },
            ScribeWord {
                text: "hello".to_string(),
                start: 1.2,
                end: 1.8,
                speaker_id: Some("speaker_1".to_string()),
            },
        ];

        let segments = fold_words_into_turns(words);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "hi there");
        assert_eq!(segments[0].speaker_id.as_deref(), Some("speaker_0"));
        assert_eq!(segments[0].start_time, 0.0);
        assert_eq!(segments[0].end_time, 1.0);
        assert_eq!(segments[1].text, "hello");
        assert_eq!(segments[1].speaker_id.as_deref(), Some("speaker_1"));
        assert_eq!(segments[1].words.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn missing_full_text_is_rebuilt_from_segments() {
        let provider = ElevenLabsProvider::new(ScribeSettings::default());
        let raw = ScribeResponse {
            text: String::new(),
            language_code: None,
            segments: vec![
                ScribeSegment {
                    text: "a".to_string(),
                    start: 0.0,
                    end: 1.0,
                    speaker_id: None,
                    confidence: None,
                },
                ScribeSegment {
                    text: "b".to_string(),
                    start: 1.0,
                    end: 2.0,
                    speaker_id: None,
                    confidence: None,
                },
            ],
            words: vec![],
        };

        let outcome = provider.parse_response(raw, &request());
        assert_eq!(outcome.text, "a b");
    }
}
