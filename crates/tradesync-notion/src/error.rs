//! Error types for tradesync-notion

use thiserror::Error;
use tradesync_core::WriteError;

/// Notion error type
#[derive(Debug, Error)]
pub enum Error {
    /// OAuth client credentials missing
    #[error("notion not configured: {0}")]
    NotConfigured(String),

    /// More trades than one batch may carry
    #[error("batch of {size} exceeds the limit of {max}")]
    BatchTooLarge {
        /// Submitted size
        size: usize,
        /// Configured ceiling
        max: usize,
    },

    /// Authorization code exchange refused
    #[error("oauth error ({status}): {message}")]
    OAuth {
        /// HTTP status code
        status: u16,
        /// Notion error message
        message: String,
    },

    /// A single page write failed
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Client construction failed
    #[error("http client error: {0}")]
    Http(String),
}

impl Error {
    /// Stable code reported to the client
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Error::NotConfigured(_) => "NOTION_NOT_CONFIGURED".to_string(),
            Error::BatchTooLarge { .. } => "BATCH_TOO_LARGE".to_string(),
            Error::OAuth { .. } => "OAUTH_EXCHANGE_FAILED".to_string(),
            Error::Write(e) => e.reason_code(),
            Error::Http(_) => "INTERNAL_ERROR".to_string(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
