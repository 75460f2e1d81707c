//! Usage counter store
//!
//! One [`UsageRecord`] per (identity, operation kind, UTC day). The daily
//! operation count is only ever changed by [`UsageStore::try_increment`], a
//! single conditional upsert; token telemetry goes through
//! [`UsageStore::add_tokens`], which never touches the count. Monthly totals
//! are derived with a `SUM` over the month and never stored.

mod sqlite;

pub use sqlite::SqliteUsageStore;

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Billable action being rate-limited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Broker text to structured trades
    Parse,
    /// AI trade review
    Analysis,
}

impl OperationKind {
    /// All kinds, in display order
    pub const ALL: [OperationKind; 2] = [OperationKind::Parse, OperationKind::Analysis];

    /// Stable storage name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Parse => "parse",
            OperationKind::Analysis => "analysis",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "parse" => Ok(OperationKind::Parse),
            "analysis" => Ok(OperationKind::Analysis),
            other => Err(Error::Internal(format!("unknown operation kind: {}", other))),
        }
    }
}

/// One identity's counts for one operation kind on one UTC day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// Rate-limit subject
    pub identity: String,
    /// Operation kind the counter belongs to
    pub kind: OperationKind,
    /// UTC calendar day
    pub date: NaiveDate,
    /// Operations consumed that day
    pub daily_operation_count: u64,
    /// Prompt tokens spent that day
    pub tokens_in: u64,
    /// Completion tokens spent that day
    pub tokens_out: u64,
}

/// Persistent counter store
///
/// Implementations must make [`try_increment`](UsageStore::try_increment)
/// atomic with respect to concurrent callers for the same key.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Sum of daily counts over the calendar month containing `date`
    async fn monthly_total(&self, identity: &str, kind: OperationKind, date: NaiveDate)
        -> Result<u64>;

    /// Insert the day's record with count 1, or add 1 while the count is
    /// below `daily_limit`. Returns `false` when the ceiling was already
    /// reached and nothing changed.
    async fn try_increment(
        &self,
        identity: &str,
        kind: OperationKind,
        date: NaiveDate,
        daily_limit: u32,
    ) -> Result<bool>;

    /// Add token telemetry to the day's record, creating it with count 0
    async fn add_tokens(
        &self,
        identity: &str,
        kind: OperationKind,
        date: NaiveDate,
        tokens_in: u64,
        tokens_out: u64,
    ) -> Result<()>;

    /// Fetch the day's record
    async fn get(
        &self,
        identity: &str,
        kind: OperationKind,
        date: NaiveDate,
    ) -> Result<Option<UsageRecord>>;
}

/// First day of the month containing `date`
#[must_use]
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

/// First day of the month after the one containing `date`
#[must_use]
pub fn next_month_start(date: NaiveDate) -> NaiveDate {
    month_start(date) + Months::new(1)
}

/// Next 00:00 UTC strictly after `now`
#[must_use]
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    (now.date_naive() + Days::new(1))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// First instant of the next UTC calendar month
#[must_use]
pub fn next_month_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    next_month_start(now.date_naive())
        .and_time(NaiveTime::MIN)
        .and_utc()
}
