//! WorkerLoop - 到達確認の実行ループ
//!
//! # フロー
//! 1. JobQueue::lease() で次の ProbeJob を取得（無ければ待つ）
//! 2. Throttle::acquire() で送信枠を確保
//! 3. ProbeTransport::probe() → classify() → Outcome
//! 4. 終端なら complete + Aggregator に記録
//! 5. RateLimited なら Decider → reschedule（または諦めて OtherError）

use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use super::outage::OutageGuard;
use crate::aggregator::Aggregator;
use crate::classify::classify;
use crate::domain::{Decider, Decision, Outcome, ProbeJob, RunId, TerminalKind};
use crate::error::QueueError;
use crate::ports::ProbeTransport;
use crate::queue::{JobLease, JobQueue, RetryRegistration};
use crate::throttle::Throttle;

/// Everything one run's workers share.
pub(crate) struct WorkerContext {
    pub run_id: RunId,
    pub queue: Arc<dyn JobQueue>,
    pub throttle: Arc<Throttle>,
    pub transport: Arc<dyn ProbeTransport>,
    pub decider: Arc<dyn Decider>,
    pub aggregator: Arc<Aggregator>,
    pub outage: Arc<OutageGuard>,
    pub cancel: CancellationToken,
}

/// Worker group handle.
/// - `request_shutdown()` でキャンセル（実行中の probe は最後まで走る）
/// - `join_next()` で 1 ワーカーずつ終了を回収できる
pub(crate) struct WorkerGroup {
    cancel: CancellationToken,
    joins: JoinSet<()>,
}

impl WorkerGroup {
    /// Spawn `n` workers.
    pub fn spawn(n: usize, ctx: Arc<WorkerContext>) -> Self {
        let mut joins = JoinSet::new();
        for worker_id in 0..n {
            let ctx = Arc::clone(&ctx);
            joins.spawn(worker_loop(worker_id, ctx));
        }
        Self {
            cancel: ctx.cancel.clone(),
            joins,
        }
    }

    /// Stop taking new jobs. In-flight probes finish and are recorded.
    pub fn request_shutdown(&self) {
        self.cancel.cancel();
    }

    /// `None` once every worker has exited.
    pub async fn join_next(&mut self) -> Option<Result<(), JoinError>> {
        self.joins.join_next().await
    }

    #[cfg(test)]
    pub async fn shutdown_and_join(mut self) {
        self.request_shutdown();
        while self.joins.join_next().await.is_some() {}
    }
}

pub(crate) async fn worker_loop(worker_id: usize, ctx: Arc<WorkerContext>) {
    // lease() はキャンセル済みなら None を返すので、ここで別途判定する必要はない
    while let Some(lease) = ctx.queue.lease().await {
        let job = lease.job();

        if ctx.throttle.acquire(job.id, &ctx.cancel).await.is_err() {
            lease.abandon().await;
            break;
        }

        // ここから先はキャンセルされても結果を必ず記録する
        let result = ctx.transport.probe(job.id).await;
        ctx.outage.observe(&result);
        let outcome = classify(&result);

        if let Err(err) = settle(worker_id, &ctx, lease, outcome).await {
            log::error!(
                "[{}] worker-{worker_id}: could not settle {}: {err}",
                ctx.run_id,
                job.id
            );
        }
    }
    log::debug!("[{}] worker-{worker_id} exiting", ctx.run_id);
}

async fn settle(
    worker_id: usize,
    ctx: &WorkerContext,
    lease: Box<dyn JobLease>,
    outcome: Outcome,
) -> Result<(), QueueError> {
    let job = lease.job();

    let kind = match outcome {
        Outcome::RateLimited { retry_after } => match ctx.decider.decide(job, retry_after) {
            Decision::Retry { job: next, delay } => {
                ctx.aggregator.record_rate_limited_retry();
                let registration = lease.reschedule(next, delay).await?;
                log_retry(ctx.run_id, worker_id, next, registration);
                return Ok(());
            }
            Decision::GiveUp { reason } => {
                log::warn!("[{}] {}: {reason}", ctx.run_id, job.id);
                TerminalKind::OtherError
            }
        },
        Outcome::Alive => TerminalKind::Alive,
        Outcome::Blocked => TerminalKind::Blocked,
        Outcome::Deleted => TerminalKind::Deleted,
        Outcome::OtherError => TerminalKind::OtherError,
    };

    lease.complete(kind).await?;
    ctx.aggregator.record_terminal(kind);

    if kind.is_failure() {
        log::warn!(
            "[{}] worker-{worker_id}: {} (attempt {}) -> {kind}",
            ctx.run_id,
            job.id,
            job.attempt
        );
    } else {
        log::debug!(
            "[{}] worker-{worker_id}: {} (attempt {}) -> {kind}",
            ctx.run_id,
            job.id,
            job.attempt
        );
    }
    Ok(())
}

fn log_retry(run_id: RunId, worker_id: usize, next: ProbeJob, registration: RetryRegistration) {
    match registration {
        RetryRegistration::Scheduled { due } => log::debug!(
            "[{run_id}] worker-{worker_id}: {} rate limited, attempt {} due in {:?}",
            next.id,
            next.attempt,
            due.saturating_duration_since(tokio::time::Instant::now())
        ),
        RetryRegistration::Dropped => log::debug!(
            "[{run_id}] worker-{worker_id}: {} rate limited after cancellation, retry dropped",
            next.id
        ),
    }
}
