//! Exponential backoff with jitter for a single remote write

use rand::Rng;
use std::time::Duration;

/// Retry behavior for one item of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; an item is tried `1 + max_retries` times
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each further retry
    pub base_delay: Duration,
    /// Upper bound of the random extra delay before the first retry, doubled likewise
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            jitter: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum retries
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set base delay
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set jitter bound
    #[must_use]
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Smallest and largest delay before retry `retry` (0-based)
    #[must_use]
    pub fn delay_bounds(&self, retry: u32) -> (Duration, Duration) {
        let factor = 2u32.saturating_pow(retry);
        let min = self.base_delay.saturating_mul(factor);
        (min, min.saturating_add(self.jitter.saturating_mul(factor)))
    }

    /// Delay before retry `retry` (0-based): `base·2ⁿ + uniform(0, jitter·2ⁿ)`
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let (min, max) = self.delay_bounds(retry);
        let spread = u64::try_from((max - min).as_millis()).unwrap_or(u64::MAX);
        let extra = if spread == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=spread)
        };
        min.saturating_add(Duration::from_millis(extra))
    }
}
