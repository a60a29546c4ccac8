//! CandidateSource port - 調査対象ユーザーの取得
//!
//! The engine reads the source exactly once per run, before any probe is
//! sent, and treats the result as an immutable sequence.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CandidateFilter, CandidateId};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("candidate storage unavailable: {0}")]
    Unavailable(String),

    #[error("io error reading candidates: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed candidate data: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Ordered, finite list of candidates passing `filter`.
    async fn list_candidates(
        &self,
        filter: CandidateFilter,
    ) -> Result<Vec<CandidateId>, SourceError>;
}
