//! In-memory pending-job queue.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{JobLease, JobQueue, JobRecord, JobState, QueueCounts, RetryRegistration};
use crate::domain::{CandidateId, ProbeJob, TerminalKind};
use crate::error::QueueError;

const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Scheduled retry entry for the priority queue.
///
/// Reverse ordering so BinaryHeap acts as a min-heap (earliest first);
/// `seq` breaks ties so equal deadlines come out in registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledJob {
    due: Instant,
    seq: u64,
    job: ProbeJob,
}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueInner {
    /// All job records (single source of truth).
    records: HashMap<CandidateId, JobRecord>,

    /// Ready queue, FIFO.
    ready: VecDeque<ProbeJob>,

    /// Deferred retries.
    scheduled: BinaryHeap<ScheduledJob>,

    in_flight: usize,
    next_seq: u64,
}

impl QueueInner {
    /// Move retries whose delay has elapsed to the back of the ready queue.
    fn promote_scheduled(&mut self) {
        let now = Instant::now();
        while let Some(entry) = self.scheduled.peek() {
            if entry.due > now {
                break;
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            if let Some(record) = self.records.get_mut(&entry.job.id)
                && record.state == JobState::RetryScheduled
            {
                record.requeue();
                self.ready.push_back(entry.job);
            }
        }
    }

    fn is_drained(&self) -> bool {
        self.in_flight == 0 && self.ready.is_empty() && self.scheduled.is_empty()
    }

    /// Cancellation: everything not yet leased is dropped, pending retries
    /// included.
    fn drop_pending(&mut self) {
        for job in self.ready.drain(..) {
            if let Some(record) = self.records.get_mut(&job.id) {
                record.mark_dropped();
            }
        }
        for entry in self.scheduled.drain() {
            if let Some(record) = self.records.get_mut(&entry.job.id) {
                record.mark_dropped();
            }
        }
    }

    fn counts_by_state(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for record in self.records.values() {
            match record.state {
                JobState::Queued => counts.queued += 1,
                JobState::InFlight => counts.in_flight += 1,
                JobState::RetryScheduled => counts.retry_scheduled += 1,
                JobState::Done(_) => counts.done += 1,
                JobState::Dropped => counts.dropped += 1,
            }
        }
        counts
    }

    /// Check that `job` is the attempt currently leased for its candidate.
    fn leased_record(&mut self, job: ProbeJob) -> Result<&mut JobRecord, QueueError> {
        let record = self
            .records
            .get_mut(&job.id)
            .ok_or(QueueError::UnknownCandidate(job.id))?;
        if record.state.is_terminal() {
            return Err(QueueError::AlreadySettled(job.id));
        }
        if record.state != JobState::InFlight || record.attempt != job.attempt {
            return Err(QueueError::StaleLease {
                id: job.id,
                attempt: job.attempt,
            });
        }
        Ok(record)
    }
}

/// In-memory queue seeded once with the run's candidate set.
///
/// Workers wait on `notify`; every transition that can unblock a waiter
/// (a retry registered, the queue drained) calls `notify_waiters`.
pub struct InMemoryJobQueue {
    inner: Arc<Mutex<QueueInner>>,
    notify: Arc<Notify>,
    cancel: CancellationToken,
    total: u64,
}

impl InMemoryJobQueue {
    /// Seed the queue. Duplicate ids are scheduled once, at their first
    /// position.
    pub fn new(candidates: impl IntoIterator<Item = CandidateId>, cancel: CancellationToken) -> Self {
        let mut records = HashMap::new();
        let mut ready = VecDeque::new();
        for id in candidates {
            if records.contains_key(&id) {
                continue;
            }
            records.insert(id, JobRecord::new());
            ready.push_back(ProbeJob::first(id));
        }
        let total = ready.len() as u64;

        Self {
            inner: Arc::new(Mutex::new(QueueInner {
                records,
                ready,
                scheduled: BinaryHeap::new(),
                in_flight: 0,
                next_seq: 0,
            })),
            notify: Arc::new(Notify::new()),
            cancel,
            total,
        }
    }

    /// Final state of one candidate (for tests and diagnostics).
    pub async fn state_of(&self, id: CandidateId) -> Option<JobState> {
        let inner = self.inner.lock().await;
        inner.records.get(&id).map(|record| record.state)
    }

    fn lease_for(&self, job: ProbeJob) -> Box<dyn JobLease> {
        Box::new(InMemoryLease {
            job,
            inner: Arc::clone(&self.inner),
            notify: Arc::clone(&self.notify),
            cancel: self.cancel.clone(),
        })
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    fn total(&self) -> u64 {
        self.total
    }

    async fn lease(&self) -> Option<Box<dyn JobLease>> {
        loop {
            // 通知の取りこぼしを防ぐため、状態を見る前に waiter として登録しておく
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_wake = {
                let mut inner = self.inner.lock().await;
                if self.cancel.is_cancelled() {
                    inner.drop_pending();
                    return None;
                }

                inner.promote_scheduled();
                if let Some(job) = inner.ready.pop_front()
                    && let Some(record) = inner.records.get_mut(&job.id)
                {
                    record.start_attempt();
                    inner.in_flight += 1;
                    return Some(self.lease_for(job));
                }

                if inner.is_drained() {
                    return None;
                }
                inner.scheduled.peek().map(|entry| entry.due)
            };

            // Wait for a notification, the next retry deadline, or cancellation.
            match next_wake {
                Some(wake) => tokio::select! {
                    _ = self.cancel.cancelled() => {},
                    _ = &mut notified => {},
                    _ = tokio::time::sleep_until(wake) => {},
                },
                None => tokio::select! {
                    _ = self.cancel.cancelled() => {},
                    _ = &mut notified => {},
                },
            }
        }
    }

    async fn counts_by_state(&self) -> QueueCounts {
        let inner = self.inner.lock().await;
        inner.counts_by_state()
    }
}

struct InMemoryLease {
    job: ProbeJob,
    inner: Arc<Mutex<QueueInner>>,
    notify: Arc<Notify>,
    cancel: CancellationToken,
}

impl InMemoryLease {
    /// Release the in-flight slot; wakes idle workers if that settled the run.
    fn release(&self, inner: &mut QueueInner) -> bool {
        inner.in_flight = inner.in_flight.saturating_sub(1);
        inner.is_drained()
    }
}

#[async_trait]
impl JobLease for InMemoryLease {
    fn job(&self) -> ProbeJob {
        self.job
    }

    async fn complete(self: Box<Self>, kind: TerminalKind) -> Result<(), QueueError> {
        let drained = {
            let mut inner = self.inner.lock().await;
            inner.leased_record(self.job)?.mark_done(kind);
            self.release(&mut inner)
        };
        if drained {
            self.notify.notify_waiters();
        }
        Ok(())
    }

    async fn reschedule(
        self: Box<Self>,
        next: ProbeJob,
        delay: Duration,
    ) -> Result<RetryRegistration, QueueError> {
        if next.id != self.job.id || next.attempt != self.job.attempt + 1 {
            return Err(QueueError::StaleLease {
                id: next.id,
                attempt: next.attempt,
            });
        }

        let registration = {
            let mut inner = self.inner.lock().await;
            inner.leased_record(self.job)?;

            let registration = if self.cancel.is_cancelled() {
                if let Some(record) = inner.records.get_mut(&next.id) {
                    record.mark_dropped();
                }
                RetryRegistration::Dropped
            } else {
                let now = Instant::now();
                // 桁あふれする delay は遠い未来に丸める
                let due = now.checked_add(delay).unwrap_or(now + FAR_FUTURE);
                let seq = inner.next_seq;
                inner.next_seq += 1;
                if let Some(record) = inner.records.get_mut(&next.id) {
                    record.schedule_retry(next.attempt);
                }
                inner.scheduled.push(ScheduledJob { due, seq, job: next });
                RetryRegistration::Scheduled { due }
            };
            self.release(&mut inner);
            registration
        };

        // Sleeping workers recompute their wake-up time; idle ones may exit.
        self.notify.notify_waiters();
        Ok(registration)
    }

    async fn abandon(self: Box<Self>) {
        let drained = {
            let mut inner = self.inner.lock().await;
            if let Some(record) = inner.records.get_mut(&self.job.id)
                && record.state == JobState::InFlight
            {
                record.mark_dropped();
            }
            self.release(&mut inner)
        };
        if drained {
            self.notify.notify_waiters();
        }
    }
}
