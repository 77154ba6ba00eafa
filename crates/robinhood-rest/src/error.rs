//! Error types for REST API operations

use robinhood_auth::AuthError;
use robinhood_types::ApiError;

use crate::transport::TransportError;

/// Errors that can occur during REST API operations
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// Malformed key material
    #[error("invalid credentials: {0}")]
    Credential(#[from] AuthError),

    /// Caller cancelled the operation
    #[error("request cancelled")]
    Cancelled,

    /// Local rate limiter can never admit another request as configured
    #[error("rate limiter exhausted: no tokens left and none will refill")]
    RateLimitUnavailable,

    /// Connection-level failure, no HTTP response received
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Server answered 429 Too Many Requests
    #[error("rate limited by server (status 429)")]
    RateLimited {
        /// Raw response body
        body: String,
    },

    /// Server answered with a 5xx status
    #[error("server error (status {status}): {body}")]
    Server { status: u16, body: String },

    /// Every attempt failed with a transient error
    #[error("max retries exceeded after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        /// Last transient error
        #[source]
        source: Box<RestError>,
    },

    /// Non-retryable status with a structured error body
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Non-retryable status whose body is not a structured error
    #[error("API error (status {status}): {body}")]
    Unstructured { status: u16, body: String },

    /// Base URL or request path could not be turned into a URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Request body could not be encoded as JSON
    #[error("failed to serialize request body: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Successful response body did not decode into the expected type
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// Client configuration rejected at construction
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Server returned a cursor that was already visited
    #[error("pagination cursor repeated: {cursor}")]
    CursorCycle { cursor: String },
}

impl RestError {
    /// Check if this error is transient and worth another attempt
    ///
    /// Only connection failures, 429 and 5xx responses qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RateLimited { .. } | Self::Server { .. }
        )
    }

    /// Check if this error came from caller cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error indicates server-side rate limiting
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::RetriesExhausted { source, .. } => source.is_rate_limited(),
            _ => false,
        }
    }

    /// HTTP status behind this error, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Server { status, .. } | Self::Unstructured { status, .. } => Some(*status),
            Self::Api(err) => Some(err.status),
            Self::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }

    /// The structured API error, if this is one
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for REST operations
pub type RestResult<T> = Result<T, RestError>;
