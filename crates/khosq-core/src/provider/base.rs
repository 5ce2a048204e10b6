//! Shared HTTP plumbing for vendor adapters.

use reqwest::Response;

use super::error::ProviderError;
use super::TranscriptionRequest;

/// Parse a `Retry-After` header as seconds, when present and numeric.
pub(crate) fn retry_after_secs(response: &Response) -> Option<f64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
}

/// Turn a non-success response into the right [`ProviderError`], consuming
/// the body for the message.
pub(crate) async fn error_from_response(provider: &str, response: Response) -> ProviderError {
    let status = response.status();
    let retry_after = retry_after_secs(&response);
    let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
    ProviderError::from_status(provider, status, retry_after, &body)
}

/// Multipart file part carrying the audio bytes.
pub(crate) fn audio_file_part(
    provider: &str,
    audio_data: Vec<u8>,
    request: &TranscriptionRequest,
) -> Result<reqwest::multipart::Part, ProviderError> {
    reqwest::multipart::Part::bytes(audio_data)
        .file_name(format!("audio.{}", request.audio_format))
        .mime_str(&request.mime_type())
        .map_err(|e| ProviderError::invalid_response(provider, format!("bad mime type: {e}")))
}

/// Milliseconds elapsed since `start`, for response metadata.
pub(crate) fn latency_ms(start: std::time::Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
