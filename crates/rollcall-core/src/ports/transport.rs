//! ProbeTransport port - 到達確認の送信先
//!
//! A probe is a minimal outbound call used only to learn whether the user
//! can still be reached; it delivers no content.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::CandidateId;

/// Successful delivery acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeAck;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// e.g. "Forbidden: bot was blocked by the user"
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// e.g. "Bad Request: chat not found"
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The transport as a whole is unusable (revoked credentials, network
    /// down). Repeated in a row, this aborts the run.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

pub type ProbeResult = Result<ProbeAck, TransportError>;

#[async_trait]
pub trait ProbeTransport: Send + Sync {
    async fn probe(&self, id: CandidateId) -> ProbeResult;
}
