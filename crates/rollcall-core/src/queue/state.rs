//! Per-candidate job state machine for the queue.

use serde::{Deserialize, Serialize};

use crate::domain::TerminalKind;

/// Job state.
///
/// State transitions:
/// - Queued -> InFlight -> Done
/// - Queued -> InFlight -> RetryScheduled -> Queued (until the retry budget is spent)
/// - Queued | RetryScheduled | InFlight -> Dropped (run cancelled before a terminal outcome)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Ready to be leased.
    Queued,

    /// Leased by a worker: waiting on the throttle or the transport.
    InFlight,

    /// Rate limited; waiting for its retry timer.
    RetryScheduled,

    /// Terminal outcome recorded.
    Done(TerminalKind),

    /// Never reached a terminal outcome because the run was cancelled.
    Dropped,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done(_) | JobState::Dropped)
    }
}
