//! Candidate filter: which users a run should probe.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

/// Activity window applied by the candidate source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateFilter {
    /// Every known user.
    #[default]
    Unrestricted,
    /// Users whose last activity falls within the last N days.
    ActiveSinceDays(NonZeroU32),
}

impl CandidateFilter {
    pub fn active_since_days(days: u32) -> Option<Self> {
        NonZeroU32::new(days).map(CandidateFilter::ActiveSinceDays)
    }

    /// Oldest activity timestamp still inside the window, `None` when unrestricted.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            CandidateFilter::Unrestricted => None,
            CandidateFilter::ActiveSinceDays(days) => {
                Some(now - ChronoDuration::days(i64::from(days.get())))
            }
        }
    }

    /// Does a user last seen at `last_active_at` pass this filter?
    pub fn admits(&self, last_active_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match self.cutoff(now) {
            None => true,
            Some(cutoff) => last_active_at.is_some_and(|seen| seen >= cutoff),
        }
    }

    /// Operator-facing label.
    pub fn label(&self) -> String {
        match self {
            CandidateFilter::Unrestricted => "all users".to_string(),
            CandidateFilter::ActiveSinceDays(days) => {
                format!("users active in last {days} day(s)")
            }
        }
    }
}

impl fmt::Display for CandidateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateFilter::Unrestricted => f.write_str("all"),
            CandidateFilter::ActiveSinceDays(days) => write!(f, "{days}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid candidate filter {0:?}: expected \"all\" or a positive number of days")]
pub struct ParseFilterError(pub String);

/// Accepts the menu presets (`all`, `30`, `7`, `1`) and any other positive day count.
impl FromStr for CandidateFilter {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(CandidateFilter::Unrestricted);
        }
        trimmed
            .parse::<u32>()
            .ok()
            .and_then(CandidateFilter::active_since_days)
            .ok_or_else(|| ParseFilterError(s.to_string()))
    }
}
