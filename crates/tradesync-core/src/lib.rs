//! TradeSync Core - Edge proxy gates
//!
//! This crate holds the parts of the TradeSync proxy that carry real
//! consistency concerns, including:
//! - Auth: License keys, timestamp freshness and HMAC request signatures
//! - Limiter: Atomic daily and monthly ceilings per license and operation kind
//! - Usage: The persistent counter store behind the limiter
//! - Batch: Paced, retrying writes to a rate-limited remote API
//! - OAuth state: One-time tokens for the OAuth authorization round trip
//!
//! Stores take an explicit [`sqlx::SqlitePool`] handle opened by [`db::connect`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod batch;
pub mod db;
pub mod error;
pub mod limiter;
pub mod oauth_state;
pub mod trade;
pub mod usage;

pub use auth::{
    mask_key, AuthOutcome, AuthRequest, AuthSettings, Authenticator, LicenseKey, LicenseRecord,
    LicenseStatus, LicenseStore, RejectReason, SqliteLicenseStore,
};
pub use batch::{
    write_batch_with_retry, FailedWrite, RetryPolicy, SucceededWrite, WriteBatchResult,
    WriteError, DEFAULT_PACING,
};
pub use error::{Error, Result};
pub use limiter::{Ceiling, LimitScope, UsageDecision, UsageLimiter, UsageLimits, UsageSnapshot};
pub use oauth_state::SqliteOAuthStateStore;
pub use trade::{TradeRecord, TradeSide};
pub use usage::{OperationKind, SqliteUsageStore, UsageRecord, UsageStore};
