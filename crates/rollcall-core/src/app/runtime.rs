//! Prober - run の起動と監督
//!
//! `start_run` spawns one coordinator task per run. The coordinator loads the
//! candidate set, seeds the queue, spawns the workers, turns Aggregator
//! changes into coalesced progress snapshots and finally decides the run's
//! terminal state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::outage::OutageGuard;
use super::progress::RunHandle;
use super::worker_loop::{WorkerContext, WorkerGroup};
use crate::aggregator::Aggregator;
use crate::config::ProberConfig;
use crate::domain::{
    Aggregate, CandidateFilter, Decider, ProgressSnapshot, RunId, RunReport, RunState,
};
use crate::error::RunError;
use crate::ports::{CandidateSource, IdGenerator, ProbeTransport};
use crate::queue::{InMemoryJobQueue, JobQueue};
use crate::throttle::Throttle;

/// The probing engine. Built with [`ProberBuilder`](super::ProberBuilder).
///
/// The throttle belongs to the engine, not to a run: two overlapping runs
/// share one rate budget.
pub struct Prober {
    pub(crate) transport: Arc<dyn ProbeTransport>,
    pub(crate) source: Arc<dyn CandidateSource>,
    pub(crate) decider: Arc<dyn Decider>,
    pub(crate) id_generator: Arc<dyn IdGenerator>,
    pub(crate) throttle: Arc<Throttle>,
    pub(crate) config: ProberConfig,
}

impl Prober {
    pub fn config(&self) -> &ProberConfig {
        &self.config
    }

    /// Start a run in the background. Must be called inside a tokio runtime.
    pub fn start_run(&self, filter: CandidateFilter) -> RunHandle {
        let run_id = self.id_generator.generate_run_id();
        let cancel = CancellationToken::new();
        let (progress_tx, progress_rx) = mpsc::channel(self.config.progress_buffer.max(1));

        let coordinator = RunCoordinator {
            run_id,
            filter,
            cancel: cancel.clone(),
            progress_tx,
            transport: Arc::clone(&self.transport),
            source: Arc::clone(&self.source),
            decider: Arc::clone(&self.decider),
            throttle: Arc::clone(&self.throttle),
            workers: self.config.workers.max(1),
            progress_interval: self.config.progress_interval,
            outage_threshold: self.config.outage_threshold,
            state: RunState::Running,
        };
        let join = tokio::spawn(coordinator.run());

        RunHandle::new(run_id, progress_rx, cancel, join)
    }
}

struct RunCoordinator {
    run_id: RunId,
    filter: CandidateFilter,
    cancel: CancellationToken,
    progress_tx: mpsc::Sender<ProgressSnapshot>,
    transport: Arc<dyn ProbeTransport>,
    source: Arc<dyn CandidateSource>,
    decider: Arc<dyn Decider>,
    throttle: Arc<Throttle>,
    workers: usize,
    progress_interval: Duration,
    outage_threshold: u32,
    state: RunState,
}

impl RunCoordinator {
    async fn run(mut self) -> Result<RunReport, RunError> {
        let run_id = self.run_id;
        log::info!("[{run_id}] starting check of {}", self.filter.label());

        let listed = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            listed = self.source.list_candidates(self.filter) => Some(listed),
        };
        let candidates = match listed {
            Some(Ok(candidates)) => candidates,
            Some(Err(source)) => {
                log::error!("[{run_id}] could not load candidates: {source}");
                self.emit_final(Aggregate::default(), RunState::Failed);
                return Err(RunError::CandidateSource { run_id, source });
            }
            None => {
                return Ok(self.finish(Aggregate::default(), RunState::Cancelled));
            }
        };

        let queue = Arc::new(InMemoryJobQueue::new(candidates, self.cancel.clone()));
        let total = queue.total();
        let aggregator = Arc::new(Aggregator::new(total));
        log::info!("[{run_id}] {total} candidates to probe");

        if total == 0 {
            return Ok(self.finish(aggregator.snapshot(), RunState::Completed));
        }

        let outage = Arc::new(OutageGuard::new(
            run_id,
            self.outage_threshold,
            self.cancel.clone(),
        ));
        let ctx = Arc::new(WorkerContext {
            run_id,
            queue: queue.clone(),
            throttle: Arc::clone(&self.throttle),
            transport: Arc::clone(&self.transport),
            decider: Arc::clone(&self.decider),
            aggregator: Arc::clone(&aggregator),
            outage: Arc::clone(&outage),
            cancel: self.cancel.clone(),
        });
        let pool = usize::try_from(total).map_or(self.workers, |n| self.workers.min(n));
        let workers = WorkerGroup::spawn(pool, ctx);

        let worker_failure = self.supervise(&aggregator, workers).await;

        let aggregate = aggregator.snapshot();
        log::debug!("[{run_id}] queue at exit: {:?}", queue.counts_by_state().await);

        if let Some(trip) = outage.tripped() {
            self.emit_final(aggregate, RunState::Failed);
            return Err(RunError::TransportOutage {
                run_id,
                consecutive: trip.consecutive,
                last_error: trip.last_error.clone(),
                partial: aggregate,
            });
        }
        if let Some(message) = worker_failure {
            log::error!("[{run_id}] worker failed: {message}");
            self.emit_final(aggregate, RunState::Failed);
            return Err(RunError::WorkerFailed {
                run_id,
                message,
                partial: aggregate,
            });
        }

        let state = if aggregate.is_complete() {
            RunState::Completed
        } else {
            RunState::Cancelled
        };
        Ok(self.finish(aggregate, state))
    }

    /// Forward progress until every worker has exited.
    ///
    /// A snapshot goes out when `processed` has moved since the last one and
    /// at least `progress_interval` has passed; changes in between collapse
    /// into the next snapshot. Returns the first worker panic, if any.
    async fn supervise(&self, aggregator: &Aggregator, mut workers: WorkerGroup) -> Option<String> {
        let mut changes = aggregator.subscribe();
        let mut failure = None;
        let mut consumer_gone = false;
        let mut dirty = false;
        let mut sent_processed = 0;
        let mut last_emit: Option<Instant> = None;

        loop {
            let due = dirty
                && last_emit.is_none_or(|at| Instant::now() >= at + self.progress_interval);
            let wake_at = last_emit.map_or_else(Instant::now, |at| at + self.progress_interval);

            tokio::select! {
                joined = workers.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(err)) => {
                        if failure.is_none() {
                            failure = Some(err.to_string());
                        }
                        workers.request_shutdown();
                    }
                    None => break,
                },
                Ok(()) = changes.changed() => {
                    if changes.borrow_and_update().processed != sent_processed {
                        dirty = true;
                    }
                }
                _ = tokio::time::sleep_until(wake_at), if dirty && !due => {}
                permit = self.progress_tx.reserve(), if due && !consumer_gone => match permit {
                    Ok(permit) => {
                        let snapshot =
                            ProgressSnapshot::new(self.run_id, aggregator.snapshot(), RunState::Running);
                        log::debug!("[{}] {}", self.run_id, snapshot.progress_line());
                        sent_processed = snapshot.processed;
                        permit.send(snapshot);
                        dirty = false;
                        last_emit = Some(Instant::now());
                    }
                    Err(_) => {
                        consumer_gone = true;
                        self.consumer_dropped();
                    }
                },
                _ = self.progress_tx.closed(), if !consumer_gone => {
                    consumer_gone = true;
                    self.consumer_dropped();
                }
            }
        }
        failure
    }

    fn consumer_dropped(&self) {
        if !self.cancel.is_cancelled() {
            log::info!("[{}] progress stream dropped, cancelling", self.run_id);
            self.cancel.cancel();
        }
    }

    /// Move to `next` and publish it as the last snapshot. A run reaches
    /// one terminal state; a second call is logged and ignored.
    ///
    /// The send never blocks: if the consumer holds the stream without reading
    /// it, the final snapshot is handed to a task that delivers it once
    /// there is room, and the run's result is available right away.
    fn emit_final(&mut self, aggregate: Aggregate, next: RunState) {
        let previous = self.state;
        if !self.state.transition(next) {
            log::warn!("[{}] already {previous:?}, ignoring {next:?}", self.run_id);
            return;
        }
        let snapshot = ProgressSnapshot::new(self.run_id, aggregate, next);
        match self.progress_tx.try_send(snapshot) {
            // 受信側が居なくなっていても結果は RunCompletion 経由で返る
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(snapshot)) => {
                let tx = self.progress_tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(snapshot).await;
                });
            }
        }
    }

    fn finish(&mut self, aggregate: Aggregate, state: RunState) -> RunReport {
        self.emit_final(aggregate, state);
        log::info!(
            "[{}] run {state:?}: {}/{} processed, alive={} blocked={} deleted={} other={} retries={}",
            self.run_id,
            aggregate.processed,
            aggregate.total,
            aggregate.alive,
            aggregate.blocked,
            aggregate.deleted,
            aggregate.other_errors,
            aggregate.rate_limited_retries
        );
        RunReport {
            run_id: self.run_id,
            state,
            aggregate,
        }
    }
}
