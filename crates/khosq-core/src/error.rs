//! Unified error types for khosq-core
//!
//! # Error Hierarchy
//!
//! ```text
//! CoreError
//!   ├── Validation            - caller-provided data is malformed or over limits
//!   ├── NotFound              - job or chunk does not exist
//!   ├── Provider(ProviderError) - vendor API failures (rate limit / transient / fatal)
//!   ├── Media(MediaError)     - local probing or transcoding failures
//!   ├── Storage               - blob store failures
//!   ├── JobCancelled          - cooperative abort, not a bug
//!   └── Internal              - anything else
//! ```
//!
//! Pipeline code returns `Result<T>` from this module; only the CLI boundary
//! converts into `anyhow` for display.

pub use crate::media::MediaError;
pub use crate::provider::ProviderError;

/// Top-level error type for khosq-core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Caller-provided data is malformed or over limits
    #[error("validation error: {0}")]
    Validation(String),

    /// Job/chunk not present
    #[error("not found: {0}")]
    NotFound(String),

    /// Vendor API failure (carries retryability)
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Local media probing or transcoding failure
    #[error(transparent)]
    Media(#[from] MediaError),

    /// Blob store failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Durable state (database) failure
    #[error("job store error: {0}")]
    JobStore(#[from] sqlx::Error),

    /// Cooperative abort raised between retry attempts
    #[error("job cancelled: {0}")]
    JobCancelled(String),

    /// I/O errors outside the media pipeline
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else
    #[error("{0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::JobCancelled(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is a cooperative cancellation rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::JobCancelled(_))
    }

    /// Whether the retry engine may re-attempt after this error.
    ///
    /// Provider errors carry their own retryability; everything else that
    /// reaches the retry loop is treated as a transient fault.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::JobCancelled(_) => false,
            _ => true,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Internal(format!("JSON serialization failed: {err}"))
    }
}

/// Convenience result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;
