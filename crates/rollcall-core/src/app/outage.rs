//! OutageGuard - トランスポート全体の障害検知
//!
//! A single `Unavailable` result is just an OtherError for that candidate.
//! A streak of them means the bot token or the network is gone, and probing
//! the rest of the list would only mislabel every remaining user.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio_util::sync::CancellationToken;

use crate::domain::RunId;
use crate::ports::{ProbeResult, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutageTrip {
    pub consecutive: u32,
    pub last_error: String,
}

pub(crate) struct OutageGuard {
    run_id: RunId,
    threshold: u32,
    consecutive: AtomicU32,
    tripped: OnceLock<OutageTrip>,
    cancel: CancellationToken,
}

impl OutageGuard {
    pub fn new(run_id: RunId, threshold: u32, cancel: CancellationToken) -> Self {
        Self {
            run_id,
            threshold: threshold.max(1),
            consecutive: AtomicU32::new(0),
            tripped: OnceLock::new(),
            cancel,
        }
    }

    /// Feed one transport result. Any answer from the far side resets the
    /// streak; reaching the threshold cancels the run once.
    pub fn observe(&self, result: &ProbeResult) {
        let Err(TransportError::Unavailable(message)) = result else {
            self.consecutive.store(0, Ordering::Relaxed);
            return;
        };

        let streak = self.consecutive.fetch_add(1, Ordering::AcqRel) + 1;
        if streak < self.threshold {
            return;
        }

        let trip = OutageTrip {
            consecutive: streak,
            last_error: message.clone(),
        };
        if self.tripped.set(trip).is_ok() {
            log::error!(
                "[{}] transport unavailable {} times in a row, aborting run: {}",
                self.run_id,
                streak,
                message
            );
            self.cancel.cancel();
        }
    }

    pub fn tripped(&self) -> Option<&OutageTrip> {
        self.tripped.get()
    }
}
