//! Request authentication
//!
//! Validates an inbound request before it reaches the usage limiter.
//! Checks run in order and stop at the first failure:
//! 1. License key present and well-formed
//! 2. Timestamp present and within the tolerance window (replay bound)
//! 3. License known and not revoked (fails open if the store is down)
//! 4. HMAC-SHA256 signature, when both a signature and a secret exist
//!
//! Authentication is pure validation; attaching the accepted identity to
//! the rest of the request is the caller's job.

#![forbid(unsafe_code)]

mod license;
pub mod signature;

pub use license::{
    mask_key, LicenseKey, LicenseRecord, LicenseStatus, LicenseStore, SqliteLicenseStore,
    KEY_ALPHABET,
};

#[cfg(test)]
pub use license::MockLicenseStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// Settings
// ============================================================================

/// Authenticator settings (deserializable from TOML)
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Shared HMAC secret; signatures are not checked when unset
    #[serde(default)]
    pub signing_secret: Option<String>,
    /// Allowed clock skew in either direction, in seconds
    #[serde(default = "default_tolerance_secs")]
    pub timestamp_tolerance_secs: u64,
}

fn default_tolerance_secs() -> u64 {
    300
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            signing_secret: None,
            timestamp_tolerance_secs: default_tolerance_secs(),
        }
    }
}

// SECURITY: Custom Debug implementation to hide the signing secret
impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "****"),
            )
            .field("timestamp_tolerance_secs", &self.timestamp_tolerance_secs)
            .finish()
    }
}

impl AuthSettings {
    /// Set the signing secret
    #[must_use]
    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing_secret = Some(secret.into());
        self
    }

    /// Set the timestamp tolerance
    #[must_use]
    pub fn with_tolerance_secs(mut self, secs: u64) -> Self {
        self.timestamp_tolerance_secs = secs;
        self
    }

    /// Secret used for verification; a blank secret counts as unset
    #[must_use]
    pub fn signing_key(&self) -> Option<&str> {
        self.signing_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Why a request was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    /// No license key supplied
    #[error("License key is required")]
    MissingIdentity,
    /// License key does not have the expected shape
    #[error("License key format is invalid")]
    InvalidIdentityFormat,
    /// No usable request timestamp
    #[error("Request timestamp is required")]
    MissingTimestamp,
    /// Timestamp outside the tolerance window
    #[error("Request timestamp is too old or in the future")]
    RequestExpired,
    /// License key unknown to the store
    #[error("License key not found")]
    IdentityNotFound,
    /// License key revoked
    #[error("License key has been revoked")]
    IdentityRevoked,
    /// Signature does not match
    #[error("Invalid request signature")]
    InvalidSignature,
}

impl RejectReason {
    /// Error code surfaced to clients
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MissingIdentity => "MISSING_IDENTITY",
            RejectReason::InvalidIdentityFormat => "INVALID_IDENTITY_FORMAT",
            RejectReason::MissingTimestamp => "MISSING_TIMESTAMP",
            RejectReason::RequestExpired => "REQUEST_EXPIRED",
            RejectReason::IdentityNotFound => "IDENTITY_NOT_FOUND",
            RejectReason::IdentityRevoked => "IDENTITY_REVOKED",
            RejectReason::InvalidSignature => "INVALID_SIGNATURE",
        }
    }
}

/// Result of [`Authenticator::authenticate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Request may proceed
    Accepted {
        /// Validated license key
        identity: LicenseKey,
        /// Stored license, `None` when the store was unreachable
        license: Option<LicenseRecord>,
    },
    /// Request must be refused
    Rejected(RejectReason),
}

/// Raw authentication material of one request
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthRequest<'a> {
    /// Claimed license key
    pub identity: Option<&'a str>,
    /// Epoch milliseconds, as sent by the client
    pub timestamp: Option<&'a str>,
    /// Hex HMAC-SHA256 of `timestamp:body`
    pub signature: Option<&'a str>,
    /// Exact request body bytes
    pub raw_body: &'a [u8],
}

// ============================================================================
// Authenticator
// ============================================================================

/// Validates identity, freshness, license status and signature
#[derive(Clone)]
pub struct Authenticator {
    licenses: Arc<dyn LicenseStore>,
    settings: AuthSettings,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl Authenticator {
    /// Create an authenticator over an explicit license store
    #[must_use]
    pub fn new(licenses: Arc<dyn LicenseStore>, mut settings: AuthSettings) -> Self {
        if settings.signing_secret.is_some() && settings.signing_key().is_none() {
            warn!("Blank signing secret ignored; request signatures will not be verified");
            settings.signing_secret = None;
        }
        Self { licenses, settings }
    }

    /// Authenticate against the current wall clock
    pub async fn authenticate(&self, request: AuthRequest<'_>) -> AuthOutcome {
        self.authenticate_at(request, Utc::now()).await
    }

    /// [`authenticate`](Self::authenticate) with an explicit clock
    pub async fn authenticate_at(&self, request: AuthRequest<'_>, now: DateTime<Utc>) -> AuthOutcome {
        let Some(raw_identity) = present(request.identity) else {
            return AuthOutcome::Rejected(RejectReason::MissingIdentity);
        };
        let Some(identity) = LicenseKey::parse(raw_identity) else {
            return AuthOutcome::Rejected(RejectReason::InvalidIdentityFormat);
        };

        let Some(timestamp) = present(request.timestamp) else {
            return AuthOutcome::Rejected(RejectReason::MissingTimestamp);
        };
        let Ok(sent_ms) = timestamp.parse::<i64>() else {
            return AuthOutcome::Rejected(RejectReason::MissingTimestamp);
        };
        let tolerance_ms = self.settings.timestamp_tolerance_secs.saturating_mul(1000);
        if now.timestamp_millis().abs_diff(sent_ms) > tolerance_ms {
            warn!(
                identity = %mask_key(identity.as_str()),
                sent_ms,
                now_ms = now.timestamp_millis(),
                "Request timestamp outside tolerance (possible replay)"
            );
            return AuthOutcome::Rejected(RejectReason::RequestExpired);
        }

        let license = match self.licenses.find(identity.as_str()).await {
            Ok(Some(record)) if record.status == LicenseStatus::Revoked => {
                return AuthOutcome::Rejected(RejectReason::IdentityRevoked);
            }
            Ok(Some(record)) => Some(record),
            Ok(None) => return AuthOutcome::Rejected(RejectReason::IdentityNotFound),
            Err(e) => {
                warn!(
                    identity = %mask_key(identity.as_str()),
                    error = %e,
                    "License store unavailable, accepting request"
                );
                None
            }
        };

        if let (Some(signature), Some(secret)) =
            (present(request.signature), self.settings.signing_key())
        {
            if !signature::verify(secret.as_bytes(), timestamp, request.raw_body, signature) {
                warn!(
                    identity = %mask_key(identity.as_str()),
                    "Request signature verification failed"
                );
                return AuthOutcome::Rejected(RejectReason::InvalidSignature);
            }
        }

        debug!(identity = %mask_key(identity.as_str()), "Request authenticated");
        AuthOutcome::Accepted { identity, license }
    }
}

#[cfg(test)]
mod tests;
