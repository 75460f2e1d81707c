//! Sequential, paced batch writes with bounded retry
//!
//! Drives a rate-limited remote API one item at a time. Each item gets up to
//! `1 + max_retries` attempts; retryable failures (HTTP 429 and 5xx) back off
//! exponentially with jitter, everything else is recorded at once. A failed
//! item never aborts the rest of the batch.

mod retry;

pub use retry::RetryPolicy;

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Default gap between consecutive items (stays under 3 requests/second)
pub const DEFAULT_PACING: Duration = Duration::from_millis(340);

/// Why one remote write failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    /// Remote answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Remote error message
        message: String,
    },
    /// No response within the request timeout
    #[error("request timed out")]
    Timeout,
    /// Connection-level failure
    #[error("network error: {0}")]
    Network(String),
    /// Success status but unusable body
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// Item refused locally, nothing was sent
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl WriteError {
    /// Whether the write may succeed if tried again (429 and 5xx)
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            WriteError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// Stable code reported to the client
    #[must_use]
    pub fn reason_code(&self) -> String {
        match self {
            WriteError::Status { status, .. } => match status {
                429 => "RATE_LIMITED".to_string(),
                500..=599 => "UPSTREAM_UNAVAILABLE".to_string(),
                400 => "BAD_REQUEST".to_string(),
                401 => "UNAUTHORIZED".to_string(),
                403 => "FORBIDDEN".to_string(),
                404 => "NOT_FOUND".to_string(),
                409 => "CONFLICT".to_string(),
                other => format!("HTTP_{}", other),
            },
            WriteError::Timeout => "TIMEOUT".to_string(),
            WriteError::Network(_) => "NETWORK_ERROR".to_string(),
            WriteError::MalformedResponse(_) => "MALFORMED_RESPONSE".to_string(),
            WriteError::InvalidRequest(_) => "BAD_REQUEST".to_string(),
        }
    }
}

/// An item the remote accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SucceededWrite {
    /// Position in the input batch
    pub index: usize,
    /// Identifier assigned by the remote
    pub remote_id: String,
}

/// An item that could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedWrite {
    /// Position in the input batch
    pub index: usize,
    /// See [`WriteError::reason_code`]
    pub reason_code: String,
    /// Last error message
    pub message: String,
    /// Calls made for this item
    pub attempts: u32,
}

/// Partitioned outcome of a batch; every input index appears exactly once
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteBatchResult {
    /// Accepted items, in input order
    pub succeeded: Vec<SucceededWrite>,
    /// Failed items, in input order
    pub failed: Vec<FailedWrite>,
}

impl WriteBatchResult {
    /// Number of items processed
    #[must_use]
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Whether the batch was empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct RetryState {
    attempt: u32,
    last_error: Option<WriteError>,
}

/// Write `items` one at a time, in order
///
/// Sleeps `pacing` before every item except the first, and at least
/// `pacing` before every retry. The caller enforces any batch size ceiling.
pub async fn write_batch_with_retry<'a, T, F, Fut>(
    items: &'a [T],
    mut write_one: F,
    pacing: Duration,
    policy: &RetryPolicy,
) -> WriteBatchResult
where
    F: FnMut(&'a T) -> Fut,
    Fut: Future<Output = Result<String, WriteError>>,
{
    let mut result = WriteBatchResult::default();

    for (index, item) in items.iter().enumerate() {
        if index > 0 && !pacing.is_zero() {
            sleep(pacing).await;
        }

        match write_with_retry(index, item, &mut write_one, pacing, policy).await {
            Ok(remote_id) => result.succeeded.push(SucceededWrite { index, remote_id }),
            Err(failed) => result.failed.push(failed),
        }
    }

    result
}

async fn write_with_retry<'a, T, F, Fut>(
    index: usize,
    item: &'a T,
    write_one: &mut F,
    pacing: Duration,
    policy: &RetryPolicy,
) -> Result<String, FailedWrite>
where
    F: FnMut(&'a T) -> Fut,
    Fut: Future<Output = Result<String, WriteError>>,
{
    let mut state = RetryState {
        attempt: 0,
        last_error: None,
    };

    for attempt in 0..=policy.max_retries {
        state.attempt = attempt;

        match write_one(item).await {
            Ok(remote_id) => {
                if attempt > 0 {
                    debug!(
                        index,
                        retries = state.attempt,
                        previous_error = ?state.last_error,
                        "Remote write succeeded after retry"
                    );
                }
                return Ok(remote_id);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt).max(pacing);
                warn!(
                    index,
                    attempt = attempt.saturating_add(1),
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Remote write failed, retrying"
                );
                state.last_error = Some(e);
                sleep(delay).await;
            }
            Err(e) => {
                let attempts = attempt.saturating_add(1);
                debug!(index, attempts, error = %e, "Remote write failed");
                return Err(FailedWrite {
                    index,
                    reason_code: e.reason_code(),
                    message: e.to_string(),
                    attempts,
                });
            }
        }
    }

    // The last attempt never takes the retry arm
    unreachable!("retry loop should always return from the final attempt")
}

#[cfg(test)]
mod tests;
