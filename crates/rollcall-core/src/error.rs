use thiserror::Error;

use crate::domain::{Aggregate, CandidateId, RunId};
use crate::ports::SourceError;

/// Run-fatal failures. Transient and per-candidate failures never end up
/// here; they are counted in the [`Aggregate`].
#[derive(Debug, Error)]
pub enum RunError {
    #[error("run {run_id}: could not load candidates: {source}")]
    CandidateSource {
        run_id: RunId,
        #[source]
        source: SourceError,
    },

    #[error(
        "run {run_id}: transport outage after {consecutive} consecutive failures ({last_error}); \
         result is incomplete"
    )]
    TransportOutage {
        run_id: RunId,
        consecutive: u32,
        last_error: String,
        partial: Aggregate,
    },

    #[error("run {run_id}: worker task failed: {message}; result is incomplete")]
    WorkerFailed {
        run_id: RunId,
        message: String,
        partial: Aggregate,
    },

    #[error("run coordinator stopped unexpectedly: {0}")]
    Coordinator(String),
}

impl RunError {
    /// Counters gathered before the failure. Never a final result.
    pub fn partial(&self) -> Option<&Aggregate> {
        match self {
            RunError::TransportOutage { partial, .. } | RunError::WorkerFailed { partial, .. } => {
                Some(partial)
            }
            RunError::CandidateSource { .. } | RunError::Coordinator(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("candidate {0} is not part of this run")]
    UnknownCandidate(CandidateId),

    #[error("candidate {0} already has a terminal outcome")]
    AlreadySettled(CandidateId),

    #[error("stale lease for candidate {id} (attempt {attempt})")]
    StaleLease { id: CandidateId, attempt: u32 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: u64,
        value: u64,
    },

    #[error("{field} must be at most {max:?}")]
    TooLarge {
        field: &'static str,
        max: std::time::Duration,
    },

    #[error("retry.multiplier must be a finite number >= 1.0, got {0}")]
    InvalidMultiplier(f64),

    #[error("environment variable {var}={value:?} is not valid: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("could not parse config: {0}")]
    Parse(String),
}
