//! Classify terminal failures into stable user-facing error codes.
//!
//! Every failure that ends a job is reduced to a short machine tag plus a
//! message suitable for showing to the submitter; both are persisted on the
//! job row. Typed errors are matched first, then the rendered message is
//! pattern-matched as a fallback for errors that bubbled up untyped.

use crate::error::CoreError;
use crate::provider::ProviderError;

pub const ERROR_RATE_LIMITED: &str = "rate_limited";
pub const ERROR_TIMEOUT: &str = "timeout";
pub const ERROR_INVALID_AUDIO: &str = "invalid_audio";
pub const ERROR_AUTH: &str = "auth_error";
pub const ERROR_PROVIDER_UNAVAILABLE: &str = "provider_unavailable";
pub const ERROR_QUOTA_EXCEEDED: &str = "quota_exceeded";
pub const ERROR_UNKNOWN: &str = "unknown";

// Patterns matched against the lowercase rendering of the error
const TIMEOUT_PATTERNS: &[&str] = &["timeout", "timed out", "deadline exceeded", "read timed out"];
const AUTH_PATTERNS: &[&str] = &[
    "401",
    "403",
    "unauthorized",
    "forbidden",
    "invalid api key",
    "permission denied",
];
const AUDIO_PATTERNS: &[&str] = &[
    "invalid audio",
    "unsupported format",
    "corrupt",
    "could not decode",
    "bad request",
];
const UNAVAILABLE_PATTERNS: &[&str] = &[
    "503",
    "502",
    "service unavailable",
    "bad gateway",
    "connection refused",
    "connection reset",
];
const QUOTA_PATTERNS: &[&str] = &["quota", "billing", "payment required", "402"];

const MSG_RATE_LIMITED: &str = "The transcription provider is temporarily rate-limiting requests. \
     Please try again in a few minutes.";
const MSG_AUTH: &str = "Authentication with the transcription provider failed. \
     Please check provider API key configuration.";
const MSG_INVALID_AUDIO: &str = "The audio file could not be processed by the provider. \
     It may be corrupted or in an unsupported format.";

fn matches_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| haystack.contains(p))
}

/// Map a terminal error to `(error_code, user_facing_message)`.
pub fn classify_error(err: &CoreError) -> (&'static str, String) {
    // Already classified by the typed hierarchy
    if let CoreError::Provider(provider_err) = err {
        if provider_err.is_rate_limit() {
            return (ERROR_RATE_LIMITED, MSG_RATE_LIMITED.to_string());
        }
        if !provider_err.is_retryable() {
            let msg = provider_err.to_string().to_lowercase();
            if matches_any(&msg, AUTH_PATTERNS) {
                return (ERROR_AUTH, MSG_AUTH.to_string());
            }
            if matches_any(&msg, AUDIO_PATTERNS) {
                return (ERROR_INVALID_AUDIO, MSG_INVALID_AUDIO.to_string());
            }
            if matches!(provider_err, ProviderError::MissingApiKey { .. }) {
                return (ERROR_AUTH, MSG_AUTH.to_string());
            }
        }
    }

    if let CoreError::Media(_) = err {
        return (ERROR_INVALID_AUDIO, MSG_INVALID_AUDIO.to_string());
    }

    // Fall back to string matching on any error
    let msg = err.to_string().to_lowercase();

    if matches_any(&msg, TIMEOUT_PATTERNS) {
        return (
            ERROR_TIMEOUT,
            "The transcription request timed out. \
             This can happen with very long audio files. Please try again."
                .to_string(),
        );
    }

    if msg.contains("429") || msg.contains("resource exhausted") || msg.contains("resourceexhausted")
    {
        return (ERROR_RATE_LIMITED, MSG_RATE_LIMITED.to_string());
    }

    if matches_any(&msg, QUOTA_PATTERNS) {
        return (
            ERROR_QUOTA_EXCEEDED,
            "The provider API quota has been exceeded. \
             Please contact the administrator."
                .to_string(),
        );
    }

    if matches_any(&msg, AUTH_PATTERNS) {
        return (ERROR_AUTH, MSG_AUTH.to_string());
    }

    if matches_any(&msg, AUDIO_PATTERNS) {
        return (ERROR_INVALID_AUDIO, MSG_INVALID_AUDIO.to_string());
    }

    if matches_any(&msg, UNAVAILABLE_PATTERNS) {
        return (
            ERROR_PROVIDER_UNAVAILABLE,
            "The transcription provider is currently unavailable. \
             Please try again later."
                .to_string(),
        );
    }

    (ERROR_UNKNOWN, format!("Transcription failed: {err}"))
}
