//! Run counters, run state machine and progress snapshots.

use serde::{Deserialize, Serialize};

use super::ids::RunId;
use super::outcome::TerminalKind;

/// Counters for one run.
///
/// Invariant: `alive + blocked + deleted + other_errors == processed <= total`.
/// `rate_limited_retries` counts retry events and is independent of `processed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub total: u64,
    pub processed: u64,
    pub alive: u64,
    pub blocked: u64,
    pub deleted: u64,
    pub other_errors: u64,
    pub rate_limited_retries: u64,
}

impl Aggregate {
    pub fn with_total(total: u64) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Sum of the four terminal buckets.
    pub fn bucket_sum(&self) -> u64 {
        self.alive + self.blocked + self.deleted + self.other_errors
    }

    pub fn is_consistent(&self) -> bool {
        self.bucket_sum() == self.processed && self.processed <= self.total
    }

    pub(crate) fn apply_terminal(&mut self, kind: TerminalKind) {
        self.processed += 1;
        match kind {
            TerminalKind::Alive => self.alive += 1,
            TerminalKind::Blocked => self.blocked += 1,
            TerminalKind::Deleted => self.deleted += 1,
            TerminalKind::OtherError => self.other_errors += 1,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed == self.total
    }
}

/// Run state.
///
/// State transitions:
/// - Running -> Completed (every candidate reached a terminal bucket)
/// - Running -> Cancelled (the consumer stopped the run)
/// - Running -> Failed (candidate set unavailable, or transport-wide outage)
///
/// The three non-running states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunState::Running)
    }

    /// Monotonic transition; returns `false` (and changes nothing) when
    /// `self` is already terminal.
    pub fn transition(&mut self, next: RunState) -> bool {
        if self.is_terminal() || next == RunState::Running {
            return false;
        }
        *self = next;
        true
    }
}

/// Immutable view of a run at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub run_id: RunId,
    pub processed: u64,
    pub total: u64,
    pub aggregate: Aggregate,
    pub state: RunState,
}

impl ProgressSnapshot {
    pub fn new(run_id: RunId, aggregate: Aggregate, state: RunState) -> Self {
        Self {
            run_id,
            processed: aggregate.processed,
            total: aggregate.total,
            aggregate,
            state,
        }
    }

    /// The final snapshot of a run; its aggregate is authoritative only
    /// when the state is `Completed`.
    pub fn is_final(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.processed as f64 / self.total as f64 * 100.0
    }

    /// `Progress: 12/40 (30.0%)`
    pub fn progress_line(&self) -> String {
        format!(
            "Progress: {}/{} ({:.1}%)",
            self.processed,
            self.total,
            self.percent()
        )
    }
}
