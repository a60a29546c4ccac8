//! Probe job: one scheduled attempt at one candidate.

use super::ids::CandidateId;

/// `attempt` starts at 0 and only the retry path produces `attempt + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeJob {
    pub id: CandidateId,
    pub attempt: u32,
}

impl ProbeJob {
    pub fn first(id: CandidateId) -> Self {
        Self { id, attempt: 0 }
    }

    pub fn next_attempt(self) -> Self {
        Self {
            id: self.id,
            attempt: self.attempt + 1,
        }
    }
}
