//! Google Gemini transcription provider
//!
//! Gemini is prompt-driven rather than a dedicated STT endpoint: the audio
//! goes inline (base64) next to a prompt that asks for diarized JSON. That
//! makes it the strongest option for Armenian with code-switching, and also
//! the most fragile to parse — the JSON may arrive wrapped in markdown
//! fences, with trailing commas, or not at all. Parsing degrades through
//! brace extraction and comma cleanup down to a single-segment fallback
//! tagged in `metadata` so the merger can flag the chunk.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::base::{error_from_response, latency_ms};
use super::error::ProviderError;
use super::{realign_segments, Segment, SpeechBackend, TranscriptionRequest, TranscriptionResponse};
use crate::settings::GeminiSettings;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(rename = "promptTokenCount")]
    prompt_tokens: Option<u64>,
    #[serde(rename = "candidatesTokenCount")]
    output_tokens: Option<u64>,
}

// The JSON shape the prompt asks the model to produce
#[derive(Deserialize)]
struct TranscriptJson {
    #[serde(default)]
    segments: Vec<TranscriptSegmentJson>,
    #[serde(default)]
    full_text: String,
}

#[derive(Deserialize)]
struct TranscriptSegmentJson {
    #[serde(default)]
    speaker: Option<String>,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Google Gemini multimodal STT provider
pub struct GeminiProvider {
    settings: GeminiSettings,
}

impl GeminiProvider {
    pub fn new(settings: GeminiSettings) -> Self {
        Self { settings }
    }

    fn build_transcription_prompt(&self, request: &TranscriptionRequest) -> String {
        let mut parts = vec!["Transcribe the following audio accurately.".to_string()];

        // Context carry: chunk N sees the tail of chunks 0..N-1 so the
        // vendor keeps speaker identity and conversational continuity.
        if let Some(context) = &request.previous_transcript_context
            && request.chunk_index > 0
        {
            parts.push(format!(
                "\n**IMPORTANT - This is a CONTINUATION of a longer recording (chunk {}).** \
                 The conversation was already in progress. Here is the recent transcript for context:\n\
                 ---\n{}\n---\n\
                 Continue transcribing from where this left off. Do not repeat the context above. \
                 Maintain speaker consistency with the context above.",
                request.chunk_index + 1,
                context
            ));
            if !request.previous_speakers.is_empty() {
                parts.push(format!(
                    "Known speakers from previous context: {}. Reuse these IDs for the same voices.",
                    request.previous_speakers.join(", ")
                ));
            }
        }

        match request.language_hint() {
            Some(lang) => parts.push(format!("Primary language: {}.", language_name(lang))),
            None => parts.push("Detect the primary language and transcribe.".to_string()),
        }

        if !request.additional_languages.is_empty() {
            let langs = request
                .additional_languages
                .iter()
                .map(|l| language_name(l))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("The audio may also contain: {langs}."));
        }

        if request.diarization_enabled {
            parts.push(
                "Identify different speakers and label them as SPEAKER_00, SPEAKER_01, etc."
                    .to_string(),
            );
            if let Some(max) = request.max_speakers {
                parts.push(format!("There are at most {max} speakers."));
            }
        }

        if !request.custom_vocabulary.is_empty() {
            parts.push(format!(
                "Important terms that may appear: {}.",
                request.custom_vocabulary.join(", ")
            ));
        }

        if let Some(domain) = &request.domain {
            parts.push(format!("Domain: {domain}."));
        }

        if let Some(prompt) = &request.prompt {
            parts.push(format!("Context: {prompt}"));
        }

        parts.push(
            r#"
Output format (JSON):
{
  "segments": [
    {
      "speaker": "SPEAKER_00",
      "start": 0.0,
      "end": 5.5,
      "text": "transcribed text here"
    }
  ],
  "full_text": "complete transcription without speaker labels"
}
"#
            .to_string(),
        );

        parts.join("\n")
    }

    fn parse_response(
        &self,
        text: &str,
        request: &TranscriptionRequest,
    ) -> (Vec<Segment>, String, Option<&'static str>) {
        if let Some(parsed) = extract_transcript_json(text) {
            let mut segments: Vec<Segment> = parsed
                .segments
                .into_iter()
                .map(|s| Segment {
                    text: s.text.trim().to_string(),
                    start_time: s.start,
                    end_time: s.end,
                    speaker_id: Some(s.speaker.unwrap_or_else(|| "SPEAKER_00".to_string())),
                    confidence: s.confidence,
                    words: None,
                })
                .collect();

            let full_text = if parsed.full_text.is_empty() {
                segments
                    .iter()
                    .map(|s| s.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            } else {
                parsed.full_text
            };

            if !full_text.is_empty() || !segments.is_empty() {
                realign_segments(&mut segments, request.audio_duration);
                return (segments, full_text, None);
            }
        }

        // Fallback: treat the whole response as plain text
        warn!("gemini returned non-JSON output, degrading to single segment");
        let clean = strip_markdown_fences(text);
        let segments = vec![Segment {
            text: clean.clone(),
            start_time: 0.0,
            end_time: request.audio_duration.max(0.1),
            speaker_id: Some("SPEAKER_00".to_string()),
            confidence: None,
            words: None,
        }];
        (segments, clean, Some("raw_text"))
    }
}

#[async_trait]
impl SpeechBackend for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn display_name(&self) -> &'static str {
        "Google Gemini"
    }

    fn supports_language(&self, _language: &str) -> bool {
        // Multimodal models cover a wide language set including Armenian
        true
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

        let prompt = self.build_transcription_prompt(request);
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": prompt },
                    { "inline_data": {
                        "mime_type": request.mime_type(),
                        "data": base64::engine::general_purpose::STANDARD.encode(&audio_data),
                    }},
                ],
            }],
            "generationConfig": {
                "temperature": 0.1,
                "maxOutputTokens": self.settings.max_output_tokens,
            },
        });

        debug!(
            audio_size = audio_data.len(),
            model = %self.settings.model,
            "gemini request"
        );

        let url = format!(
            "{API_BASE}/{}:generateContent?key={}",
            self.settings.model, self.settings.api_key
        );

        let started = std::time::Instant::now();
        let response = client
            .post(&url)
            .timeout(std::time::Duration::from_secs(
                self.settings.request_timeout_secs,
            ))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(self.name(), e))?;

        if !response.status().is_success() {
            return Err(error_from_response(self.name(), response).await);
        }

        let elapsed_ms = latency_ms(started);
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(self.name(), e.to_string()))?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::invalid_response(self.name(), "no candidates"))?;

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::invalid_response(
                self.name(),
                "empty response text",
            ));
        }

        let (segments, full_text, fallback) = self.parse_response(&text, request);

        let mut metadata = serde_json::Map::new();
        metadata.insert("model".to_string(), json!(self.settings.model));
        metadata.insert("latency_ms".to_string(), json!(elapsed_ms));
        if let Some(reason) = candidate.finish_reason {
            metadata.insert("finish_reason".to_string(), json!(reason));
        }
        if let Some(usage) = parsed.usage {
            metadata.insert("prompt_tokens".to_string(), json!(usage.prompt_tokens));
            metadata.insert("output_tokens".to_string(), json!(usage.output_tokens));
        }
        if let Some(tag) = fallback {
            metadata.insert("fallback".to_string(), json!(tag));
        }

        Ok(TranscriptionResponse {
            text: full_text,
            segments,
            language_detected: request.language_hint().map(String::from),
            metadata,
        })
    }
}

/// Pull the transcript JSON out of free-form model output.
///
/// Tries the outermost brace span first; on failure, strips trailing
/// commas and retries once.
fn extract_transcript_json(text: &str) -> Option<TranscriptJson> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let json_str = &text[start..=end];

    if let Ok(parsed) = serde_json::from_str(json_str) {
        return Some(parsed);
    }

    let cleaned = strip_trailing_commas(json_str);
    serde_json::from_str(&cleaned).ok()
}

/// Remove commas that directly precede a closing bracket or brace.
///
/// String literals are tracked so commas inside transcribed text survive.
fn strip_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut pending = String::new();

    for ch in input.chars() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => {
                out.push_str(&pending);
                pending.clear();
                in_string = true;
                out.push(ch);
            }
            ',' => {
                out.push_str(&pending);
                pending.clear();
                pending.push(ch);
            }
            c if c.is_whitespace() && pending.starts_with(',') => pending.push(c),
            ']' | '}' => {
                // drop a pending comma, keep its whitespace
                if let Some(stripped) = pending.strip_prefix(',') {
                    out.push_str(stripped);
                } else {
                    out.push_str(&pending);
                }
                pending.clear();
                out.push(ch);
            }
            c => {
                out.push_str(&pending);
                pending.clear();
                out.push(c);
            }
        }
    }
    out.push_str(&pending);
    out
}

/// Strip markdown code fences (```json ... ```) from model output.
fn strip_markdown_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out.trim().to_string()
}

fn language_name(code: &str) -> &str {
    match code {
        "hy" => "Armenian",
        "en" => "English",
        "ru" => "Russian",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        other => other,
    }
}
