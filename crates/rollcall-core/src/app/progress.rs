//! Progress - 実行中の run へのハンドル
//!
//! A run hands back two halves:
//! - [`ProgressStream`]: the snapshots, ending with the terminal one.
//!   Dropping it cancels the run.
//! - [`RunCompletion`]: resolves to the final [`RunReport`].
//!
//! The run's result never waits on the stream: a caller may hold the stream
//! unread and still get its report from [`RunCompletion::wait`]. The final
//! snapshot is delivered whenever the stream is read again.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::domain::{ProgressSnapshot, RunId, RunReport};
use crate::error::RunError;

pub struct ProgressStream {
    rx: mpsc::Receiver<ProgressSnapshot>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl ProgressStream {
    pub(crate) fn new(rx: mpsc::Receiver<ProgressSnapshot>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    /// Next snapshot; `None` after the terminal one.
    pub async fn recv(&mut self) -> Option<ProgressSnapshot> {
        self.rx.recv().await
    }

    /// Request cancellation without giving up the stream. The remaining
    /// snapshots, including the final `Cancelled` one, still arrive.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for ProgressStream {
    type Item = ProgressSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

pub struct RunCompletion {
    run_id: RunId,
    join: JoinHandle<Result<RunReport, RunError>>,
}

impl RunCompletion {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// `Ok` for Completed and Cancelled runs, `Err` for run-fatal failures.
    pub async fn wait(self) -> Result<RunReport, RunError> {
        match self.join.await {
            Ok(result) => result,
            Err(err) => Err(RunError::Coordinator(err.to_string())),
        }
    }
}

pub struct RunHandle {
    stream: ProgressStream,
    completion: RunCompletion,
}

impl RunHandle {
    pub(crate) fn new(
        run_id: RunId,
        rx: mpsc::Receiver<ProgressSnapshot>,
        cancel: CancellationToken,
        join: JoinHandle<Result<RunReport, RunError>>,
    ) -> Self {
        Self {
            stream: ProgressStream::new(rx, cancel),
            completion: RunCompletion { run_id, join },
        }
    }

    pub fn run_id(&self) -> RunId {
        self.completion.run_id
    }

    pub fn cancel(&self) {
        self.stream.cancel();
    }

    pub fn into_parts(self) -> (ProgressStream, RunCompletion) {
        (self.stream, self.completion)
    }

    /// Drain the progress stream without looking at it, then wait.
    pub async fn finish(self) -> Result<RunReport, RunError> {
        let (mut stream, completion) = self.into_parts();
        while stream.recv().await.is_some() {}
        completion.wait().await
    }
}
