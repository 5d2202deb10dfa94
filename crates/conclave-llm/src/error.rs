//! Error types for conclave-llm

use thiserror::Error;

/// LLM error type
#[derive(Debug, Error)]
pub enum Error {
    /// Provider not configured
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// API error (non-success HTTP status)
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Sanitized response body
        message: String,
    },

    /// API key rejected by the provider (401/403)
    #[error("{0} API key is invalid or unauthorized")]
    Unauthorized(String),

    /// Rate limit exceeded (429)
    #[error("{0} rate limit exceeded")]
    RateLimit(String),

    /// Invalid response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
