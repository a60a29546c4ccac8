//! Job record: per-candidate bookkeeping inside the queue.

use super::JobState;
use crate::domain::TerminalKind;

/// Single source of truth for one candidate's progress through the run.
///
/// The ready and scheduled structures only hold `ProbeJob`s; every state
/// transition goes through this record.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub state: JobState,

    /// Attempt number of the job currently leased or queued.
    pub attempt: u32,
}

impl JobRecord {
    pub fn new() -> Self {
        Self {
            state: JobState::Queued,
            attempt: 0,
        }
    }

    pub fn start_attempt(&mut self) {
        self.state = JobState::InFlight;
    }

    pub fn mark_done(&mut self, kind: TerminalKind) {
        self.state = JobState::Done(kind);
    }

    pub fn schedule_retry(&mut self, attempt: u32) {
        self.state = JobState::RetryScheduled;
        self.attempt = attempt;
    }

    /// RetryScheduled -> Queued.
    pub fn requeue(&mut self) {
        self.state = JobState::Queued;
    }

    pub fn mark_dropped(&mut self) {
        self.state = JobState::Dropped;
    }
}

impl Default for JobRecord {
    fn default() -> Self {
        Self::new()
    }
}
