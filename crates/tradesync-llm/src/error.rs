//! Error types for tradesync-llm

use thiserror::Error;

/// LLM error type
#[derive(Debug, Error)]
pub enum Error {
    /// Client not configured (missing API key)
    #[error("llm not configured: {0}")]
    NotConfigured(String),

    /// Provider answered with a non-success status
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Sanitized provider message
        message: String,
    },

    /// No response within the operation's timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Reply could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Model declined the input (e.g. `NOT_TRADE_DATA`)
    #[error("{code}: {message}")]
    Rejected {
        /// Machine-readable code from the model
        code: String,
        /// Human-readable explanation
        message: String,
    },
}

impl Error {
    /// Stable code reported to the client
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Error::NotConfigured(_) => "LLM_NOT_CONFIGURED",
            Error::Api { status: 429, .. } => "LLM_RATE_LIMITED",
            Error::Api { .. } => "LLM_API_ERROR",
            Error::Timeout(_) => "LLM_TIMEOUT",
            Error::Network(_) => "LLM_NETWORK_ERROR",
            Error::InvalidResponse(_) => "LLM_INVALID_RESPONSE",
            Error::Rejected { code, .. } => code,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
