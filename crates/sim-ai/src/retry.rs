//! Retry policy: status classification and exponential backoff with jitter.

use std::time::Duration;

/// How a response status is handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// 2xx: parse and return.
    Success,
    /// Client error: give up immediately.
    Fatal,
    /// Server error or rate limit: back off and try again.
    Retry,
}

/// Classify an HTTP status code.
pub fn classify(status: u16) -> Disposition {
    match status {
        200..=299 => Disposition::Success,
        429 => Disposition::Retry,
        400..=499 => Disposition::Fatal,
        500..=599 => Disposition::Retry,
        _ => Disposition::Fatal,
    }
}

/// Exponential backoff bounded by an attempt count.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_retries: u32,
    /// Delay before the second attempt, before jitter; doubles each attempt.
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to each delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Attempts actually made; at least one.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Delay after failed attempt `attempt` (0-indexed): `base * 2^attempt`
    /// plus `jitter_frac * max_jitter`, where `jitter_frac` is in [0, 1).
    pub fn delay_for(&self, attempt: u32, jitter_frac: f64) -> Duration {
        let factor = 1u32 << attempt.min(16);
        let jitter = self.max_jitter.mul_f64(jitter_frac.clamp(0.0, 1.0));
        self.base_delay * factor + jitter
    }
}
