//! Queue module: job state, retry policy, and the in-memory pending queue.

mod memory;
mod record;
pub mod retry;
mod state;

pub use memory::InMemoryJobQueue;
pub use record::JobRecord;
pub use retry::RetryPolicy;
pub use state::JobState;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::domain::{ProbeJob, TerminalKind};
use crate::error::QueueError;

/// What became of a retry handed to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryRegistration {
    /// The job will be ready again at `due`.
    Scheduled { due: Instant },
    /// The run was cancelled; the retry was dropped instead of revived.
    Dropped,
}

/// A leased job. The worker owns it and must settle it exactly once:
/// `complete`, `reschedule` or `abandon` all consume the lease.
///
/// - Queue manages state transitions (Queued -> InFlight -> ...).
/// - Worker probes the transport and reports the result.
#[async_trait]
pub trait JobLease: Send {
    fn job(&self) -> ProbeJob;

    /// Record the terminal outcome for this candidate.
    async fn complete(self: Box<Self>, kind: TerminalKind) -> Result<(), QueueError>;

    /// Re-enqueue `next` (same candidate, next attempt) after `delay`.
    async fn reschedule(
        self: Box<Self>,
        next: ProbeJob,
        delay: Duration,
    ) -> Result<RetryRegistration, QueueError>;

    /// Give the job up without probing it (run cancelled while throttled).
    async fn abandon(self: Box<Self>);
}

/// Queue port (interface).
/// The in-memory implementation is the only one; this trait is the seam.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Number of distinct candidates seeded into the run.
    fn total(&self) -> u64;

    /// Lease the next ready job. Waits while retries are pending or jobs are
    /// in flight; returns `None` once everything is settled or the run is
    /// cancelled.
    async fn lease(&self) -> Option<Box<dyn JobLease>>;

    async fn counts_by_state(&self) -> QueueCounts;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub queued: usize,
    pub in_flight: usize,
    pub retry_scheduled: usize,
    pub done: usize,
    pub dropped: usize,
}
