//! Engine configuration.
//!
//! Sources, lowest priority first: [`ProberConfig::default`], a JSON document
//! (durations in milliseconds), then `ROLLCALL_*` environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::queue::RetryPolicy;
use crate::queue::retry::millis;
use crate::throttle::ThrottleConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProberConfig {
    /// Concurrent workers (upper bound on in-flight probes).
    pub workers: usize,

    pub retry: RetryPolicy,

    pub throttle: ThrottleConfig,

    /// Minimum spacing between two interim progress snapshots.
    #[serde(with = "millis")]
    pub progress_interval: Duration,

    /// Consecutive `Unavailable` transport results that abort the run.
    pub outage_threshold: u32,

    /// Capacity of the progress channel.
    pub progress_buffer: usize,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            retry: RetryPolicy::default(),
            throttle: ThrottleConfig::default(),
            progress_interval: Duration::from_secs(1),
            outage_threshold: 20,
            progress_buffer: 16,
        }
    }
}

impl ProberConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Apply environment overrides on top of `self`.
    ///
    /// Environment variables:
    /// - `ROLLCALL_WORKERS`
    /// - `ROLLCALL_MAX_RETRIES`
    /// - `ROLLCALL_RATE_PER_SEC` (global calls per second)
    /// - `ROLLCALL_BURST`
    /// - `ROLLCALL_PER_CHAT_INTERVAL_MS` (0 disables per-chat spacing)
    /// - `ROLLCALL_PROGRESS_INTERVAL_MS`
    /// - `ROLLCALL_OUTAGE_THRESHOLD`
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(workers) = env_parse::<usize>("ROLLCALL_WORKERS")? {
            self.workers = workers;
        }
        if let Some(max_retries) = env_parse::<u32>("ROLLCALL_MAX_RETRIES")? {
            self.retry.max_retries = max_retries;
        }
        if let Some(rate) = env_parse::<u32>("ROLLCALL_RATE_PER_SEC")? {
            self.throttle.max_calls = rate;
            self.throttle.period = Duration::from_secs(1);
        }
        if let Some(burst) = env_parse::<u32>("ROLLCALL_BURST")? {
            self.throttle.burst = burst;
        }
        if let Some(ms) = env_parse::<u64>("ROLLCALL_PER_CHAT_INTERVAL_MS")? {
            self.throttle.per_destination_interval =
                (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(ms) = env_parse::<u64>("ROLLCALL_PROGRESS_INTERVAL_MS")? {
            self.progress_interval = Duration::from_millis(ms);
        }
        if let Some(threshold) = env_parse::<u32>("ROLLCALL_OUTAGE_THRESHOLD")? {
            self.outage_threshold = threshold;
        }
        Ok(self)
    }

    /// Defaults plus environment overrides, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::default().with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        at_least("workers", self.workers as u64, 1)?;
        at_least("throttle.max_calls", u64::from(self.throttle.max_calls), 1)?;
        at_least("throttle.burst", u64::from(self.throttle.burst), 1)?;
        at_least(
            "throttle.period_ms",
            self.throttle.period.as_millis() as u64,
            1,
        )?;
        at_least("outage_threshold", u64::from(self.outage_threshold), 1)?;
        at_least("progress_buffer", self.progress_buffer as u64, 1)?;

        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(self.retry.multiplier));
        }
        at_most("retry.max_delay", self.retry.max_delay)?;
        at_most(
            "throttle.period * throttle.burst",
            self.throttle
                .period
                .checked_mul(self.throttle.burst)
                .unwrap_or(Duration::MAX),
        )?;
        if let Some(gap) = self.throttle.per_destination_interval {
            at_most("throttle.per_destination_interval", gap)?;
        }
        at_most("progress_interval", self.progress_interval)?;
        Ok(())
    }
}

/// Upper bound for every configured wait. Deadlines are computed as
/// `Instant + duration`, which must not overflow.
const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

fn at_most(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value > MAX_WAIT {
        return Err(ConfigError::TooLarge {
            field,
            max: MAX_WAIT,
        });
    }
    Ok(())
}

fn at_least(field: &'static str, value: u64, min: u64) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::TooSmall { field, min, value });
    }
    Ok(())
}

fn env_parse<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| ConfigError::InvalidEnv {
                var,
                value: raw.clone(),
                reason: err.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
