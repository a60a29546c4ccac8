//! Retry policy: decides how long a rate-limited job waits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy for rate-limited probes.
///
/// The transport normally tells us how long to wait (`retry_after`); that
/// value wins. Exponential backoff is only the fallback for a signal that
/// carries no usable delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries allowed per candidate. Attempt numbers `0..max_retries` may be
    /// retried; the attempt numbered `max_retries` becomes an OtherError.
    pub max_retries: u32,

    /// Base delay for the fallback backoff.
    #[serde(with = "millis")]
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Upper bound applied to every delay, hinted or not.
    #[serde(with = "millis")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Fallback delay for the retry following `attempt` (0-indexed).
    ///
    /// delay = base_delay * multiplier^attempt
    /// - attempt 0: 1s
    /// - attempt 1: 2s
    /// - attempt 2: 4s
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        if delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        // NaN や負の値もここで max_delay に倒す
        Duration::try_from_secs_f64(delay_secs).unwrap_or(self.max_delay)
    }

    /// Delay before re-enqueuing, measured from the rate-limit signal.
    pub fn delay_for(&self, attempt: u32, retry_after: Duration) -> Duration {
        if retry_after.is_zero() {
            self.backoff(attempt)
        } else {
            retry_after.min(self.max_delay)
        }
    }

    pub fn may_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u128::from(u64::MAX)) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
