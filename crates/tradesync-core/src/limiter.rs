//! Usage limiting for billable operations
//!
//! Enforces a monthly and a daily ceiling per identity and operation kind
//! before an expensive downstream call. The monthly check is a read-only
//! `SUM`; the daily check is the store's atomic conditional upsert, so two
//! concurrent requests can never both take the last slot.
//!
//! Store failures fail open: an unreachable store allows the request and
//! logs a warning instead of blocking users during a transient outage.

use crate::auth::mask_key;
use crate::error::Result;
use crate::usage::{next_month_reset, next_utc_midnight, OperationKind, UsageStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Daily and monthly ceilings for one operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ceiling {
    /// Operations allowed per UTC day
    #[serde(default = "default_daily")]
    pub daily: u32,
    /// Operations allowed per UTC calendar month
    #[serde(default = "default_monthly")]
    pub monthly: u32,
}

fn default_daily() -> u32 {
    10
}
fn default_monthly() -> u32 {
    200
}

impl Default for Ceiling {
    fn default() -> Self {
        Self {
            daily: default_daily(),
            monthly: default_monthly(),
        }
    }
}

impl Ceiling {
    /// Create a ceiling pair
    #[must_use]
    pub fn new(daily: u32, monthly: u32) -> Self {
        Self { daily, monthly }
    }
}

/// Ceilings for every operation kind (deserializable from TOML)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimits {
    /// Trade text parsing
    #[serde(default)]
    pub parse: Ceiling,
    /// AI trade review
    #[serde(default)]
    pub analysis: Ceiling,
}

impl UsageLimits {
    /// Same ceiling for every kind
    #[must_use]
    pub fn uniform(ceiling: Ceiling) -> Self {
        Self {
            parse: ceiling,
            analysis: ceiling,
        }
    }

    /// Ceiling for a given kind
    #[must_use]
    pub fn for_kind(&self, kind: OperationKind) -> Ceiling {
        match kind {
            OperationKind::Parse => self.parse,
            OperationKind::Analysis => self.analysis,
        }
    }
}

/// Which ceiling denied a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitScope {
    /// Per-day ceiling
    Daily,
    /// Per-month ceiling
    Monthly,
}

impl LimitScope {
    /// Error code surfaced to clients
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            LimitScope::Daily => "DAILY_LIMIT_EXCEEDED",
            LimitScope::Monthly => "MONTHLY_LIMIT_EXCEEDED",
        }
    }
}

/// Result of [`UsageLimiter::check_and_consume`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageDecision {
    /// The operation was counted (or the store was unreachable)
    Allowed,
    /// A ceiling was reached; nothing was counted
    Denied {
        /// Ceiling that was hit
        scope: LimitScope,
        /// When the ceiling resets
        reset_at: DateTime<Utc>,
    },
}

impl UsageDecision {
    /// Whether the request may proceed
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, UsageDecision::Allowed)
    }
}

/// Current usage for one identity and kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    /// Operation kind
    pub kind: OperationKind,
    /// Operations counted today
    pub daily_used: u64,
    /// Daily ceiling
    pub daily_limit: u32,
    /// Operations counted this month
    pub monthly_used: u64,
    /// Monthly ceiling
    pub monthly_limit: u32,
    /// Next UTC midnight
    pub daily_reset_at: DateTime<Utc>,
    /// First instant of next UTC month
    pub monthly_reset_at: DateTime<Utc>,
}

/// Persistent daily/monthly usage limiter
#[derive(Clone)]
pub struct UsageLimiter {
    store: Arc<dyn UsageStore>,
    limits: UsageLimits,
}

impl UsageLimiter {
    /// Create a limiter over an explicit store handle
    #[must_use]
    pub fn new(store: Arc<dyn UsageStore>, limits: UsageLimits) -> Self {
        Self { store, limits }
    }

    /// Configured ceilings
    #[must_use]
    pub fn limits(&self) -> &UsageLimits {
        &self.limits
    }

    /// Check both ceilings and count the operation if allowed
    pub async fn check_and_consume(&self, identity: &str, kind: OperationKind) -> UsageDecision {
        self.check_and_consume_at(identity, kind, Utc::now()).await
    }

    /// [`check_and_consume`](Self::check_and_consume) with an explicit clock
    pub async fn check_and_consume_at(
        &self,
        identity: &str,
        kind: OperationKind,
        now: DateTime<Utc>,
    ) -> UsageDecision {
        match self.try_consume(identity, kind, now).await {
            Ok(decision) => {
                if let UsageDecision::Denied { scope, reset_at } = decision {
                    info!(
                        identity = %mask_key(identity),
                        kind = %kind,
                        code = scope.code(),
                        reset_at = %reset_at,
                        "Usage ceiling reached"
                    );
                }
                decision
            }
            Err(e) => {
                warn!(
                    identity = %mask_key(identity),
                    kind = %kind,
                    error = %e,
                    "Usage store unavailable, allowing request"
                );
                UsageDecision::Allowed
            }
        }
    }

    async fn try_consume(
        &self,
        identity: &str,
        kind: OperationKind,
        now: DateTime<Utc>,
    ) -> Result<UsageDecision> {
        let ceiling = self.limits.for_kind(kind);
        let today = now.date_naive();

        let monthly_used = self.store.monthly_total(identity, kind, today).await?;
        if monthly_used >= u64::from(ceiling.monthly) {
            return Ok(UsageDecision::Denied {
                scope: LimitScope::Monthly,
                reset_at: next_month_reset(now),
            });
        }

        let daily_denied = UsageDecision::Denied {
            scope: LimitScope::Daily,
            reset_at: next_utc_midnight(now),
        };

        if ceiling.daily == 0 {
            return Ok(daily_denied);
        }

        if self
            .store
            .try_increment(identity, kind, today, ceiling.daily)
            .await?
        {
            debug!(identity = %mask_key(identity), kind = %kind, "Usage counted");
            Ok(UsageDecision::Allowed)
        } else {
            Ok(daily_denied)
        }
    }

    /// Add token telemetry after a successful downstream call
    ///
    /// Never changes the operation count and never fails: store errors are
    /// logged and dropped.
    pub async fn record_token_usage(
        &self,
        identity: &str,
        kind: OperationKind,
        tokens_in: u64,
        tokens_out: u64,
    ) {
        self.record_token_usage_at(identity, kind, tokens_in, tokens_out, Utc::now())
            .await;
    }

    /// [`record_token_usage`](Self::record_token_usage) with an explicit clock
    pub async fn record_token_usage_at(
        &self,
        identity: &str,
        kind: OperationKind,
        tokens_in: u64,
        tokens_out: u64,
        now: DateTime<Utc>,
    ) {
        if let Err(e) = self
            .store
            .add_tokens(identity, kind, now.date_naive(), tokens_in, tokens_out)
            .await
        {
            warn!(
                identity = %mask_key(identity),
                kind = %kind,
                error = %e,
                "Failed to record token usage"
            );
        }
    }

    /// Current counters and ceilings
    pub async fn usage_snapshot(
        &self,
        identity: &str,
        kind: OperationKind,
    ) -> Result<UsageSnapshot> {
        self.usage_snapshot_at(identity, kind, Utc::now()).await
    }

    /// [`usage_snapshot`](Self::usage_snapshot) with an explicit clock
    pub async fn usage_snapshot_at(
        &self,
        identity: &str,
        kind: OperationKind,
        now: DateTime<Utc>,
    ) -> Result<UsageSnapshot> {
        let ceiling = self.limits.for_kind(kind);
        let today = now.date_naive();

        let daily_used = self
            .store
            .get(identity, kind, today)
            .await?
            .map(|r| r.daily_operation_count)
            .unwrap_or(0);
        let monthly_used = self.store.monthly_total(identity, kind, today).await?;

        Ok(UsageSnapshot {
            kind,
            daily_used,
            daily_limit: ceiling.daily,
            monthly_used,
            monthly_limit: ceiling.monthly,
            daily_reset_at: next_utc_midnight(now),
            monthly_reset_at: next_month_reset(now),
        })
    }
}
