//! Error types for tradesync-core
//!
//! Only store-facing helpers return these. The request gates
//! (`Authenticator`, `UsageLimiter`, `write_batch_with_retry`) return closed
//! outcome enums instead, so callers never need a catch-all.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Backing store failure (unreachable, locked, malformed row)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid configuration
    #[error("invalid configuration: {field}: {message}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// License key is malformed or unknown
    #[error("license error: {0}")]
    License(String),

    /// Internal error (filesystem, serialization, etc.)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
