//! Provider-specific error types
//!
//! Retryability is encoded in the variant: the retry engine asks
//! [`ProviderError::is_retryable`] instead of inspecting messages.

use reqwest::StatusCode;

/// Errors that can occur during transcription provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Provider not found in registry
    #[error("provider not found: {0}")]
    NotFound(String),

    /// API key is missing for a provider that requires one
    #[error("API key missing for {provider}")]
    MissingApiKey { provider: String },

    /// 429 / quota exhaustion, with the vendor's Retry-After when present
    #[error("{provider} rate limit exceeded")]
    RateLimited {
        provider: String,
        retry_after: Option<f64>,
    },

    /// Transient vendor failure (5xx, overload), worth retrying
    #[error("{provider} unavailable: {message}")]
    Unavailable { provider: String, message: String },

    /// Permanent refusal (auth, invalid input, policy); never retried
    #[error("{provider} rejected the request: {message}")]
    Rejected { provider: String, message: String },

    /// Response arrived but could not be mapped to the canonical shape
    #[error("invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    /// Connection-level failure (reset, DNS, timeout)
    #[error("network error calling {provider}: {message}")]
    Network { provider: String, message: String },
}

impl ProviderError {
    pub fn rate_limited(provider: impl Into<String>, retry_after: Option<f64>) -> Self {
        Self::RateLimited {
            provider: provider.into(),
            retry_after,
        }
    }

    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn rejected(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
        }
    }

    /// Whether the retry engine may re-attempt after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. }
            | Self::Unavailable { .. }
            | Self::Network { .. }
            | Self::InvalidResponse { .. } => true,
            Self::NotFound(_) | Self::MissingApiKey { .. } | Self::Rejected { .. } => false,
        }
    }

    /// Whether this is a 429/quota signal.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Vendor-suggested wait before retrying, in seconds.
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Map an HTTP error status to the right variant.
    pub fn from_status(
        provider: &str,
        status: StatusCode,
        retry_after: Option<f64>,
        body: &str,
    ) -> Self {
        let message = format!("API error ({status}): {body}");
        if status == StatusCode::TOO_MANY_REQUESTS {
            Self::rate_limited(provider, retry_after)
        } else if status.is_server_error() {
            Self::unavailable(provider, message)
        } else {
            // 4xx: auth, invalid input, policy
            Self::rejected(provider, message)
        }
    }

    /// Map a transport-level reqwest failure.
    pub fn from_transport(provider: &str, err: reqwest::Error) -> Self {
        if err.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
            return Self::rate_limited(provider, None);
        }
        let message = if err.is_timeout() {
            format!("request timeout: {err}")
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };
        Self::Network {
            provider: provider.to_string(),
            message,
        }
    }
}
