//! Outcome model: what one probe said about one candidate.
//!
//! `RateLimited` is transient and never stored as a final classification;
//! the four `TerminalKind`s are the only buckets a candidate can end up in.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Final classification of a candidate.
///
/// Serialized as SCREAMING_SNAKE_CASE so operator-facing exports read
/// `ALIVE` / `BLOCKED` / `DELETED` / `OTHER_ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalKind {
    Alive,
    Blocked,
    Deleted,
    OtherError,
}

impl TerminalKind {
    /// Blocked and Deleted are valid answers about the user, not failures.
    pub fn is_failure(self) -> bool {
        matches!(self, TerminalKind::OtherError)
    }
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminalKind::Alive => "alive",
            TerminalKind::Blocked => "blocked",
            TerminalKind::Deleted => "deleted",
            TerminalKind::OtherError => "other_error",
        };
        f.write_str(s)
    }
}

/// Classification of a single probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Alive,
    Blocked,
    Deleted,
    OtherError,
    /// Transient: the transport asked us to come back after `retry_after`.
    RateLimited { retry_after: Duration },
}
