//! Candidate sources: a fixed in-memory list and a JSON export file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CandidateFilter, CandidateId};
use crate::ports::{CandidateSource, Clock, SourceError, SystemClock};

/// One row of the user table as far as probing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub user_id: CandidateId,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
}

impl CandidateRecord {
    pub fn new(user_id: i64, last_active_at: Option<DateTime<Utc>>) -> Self {
        Self {
            user_id: CandidateId::new(user_id),
            last_active_at,
        }
    }
}

fn select(records: &[CandidateRecord], filter: CandidateFilter, now: DateTime<Utc>) -> Vec<CandidateId> {
    records
        .iter()
        .filter(|record| filter.admits(record.last_active_at, now))
        .map(|record| record.user_id)
        .collect()
}

pub struct InMemoryCandidateSource {
    records: Vec<CandidateRecord>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCandidateSource {
    pub fn new(records: impl IntoIterator<Item = CandidateRecord>) -> Self {
        Self {
            records: records.into_iter().collect(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Candidates without activity data; only an unrestricted run sees them.
    pub fn from_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self::new(ids.into_iter().map(|id| CandidateRecord::new(id, None)))
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}

#[async_trait]
impl CandidateSource for InMemoryCandidateSource {
    async fn list_candidates(
        &self,
        filter: CandidateFilter,
    ) -> Result<Vec<CandidateId>, SourceError> {
        Ok(select(&self.records, filter, self.clock.now()))
    }
}

/// Reads `[{"user_id": 42, "last_active_at": "2024-05-01T12:00:00Z"}, ...]`
/// on every call, so a run always sees the current export.
pub struct JsonFileCandidateSource {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl JsonFileCandidateSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CandidateSource for JsonFileCandidateSource {
    async fn list_candidates(
        &self,
        filter: CandidateFilter,
    ) -> Result<Vec<CandidateId>, SourceError> {
        let bytes = tokio::fs::read(&self.path).await?;
        let records: Vec<CandidateRecord> = serde_json::from_slice(&bytes).map_err(|err| {
            SourceError::Malformed(format!("{}: {err}", self.path.display()))
        })?;
        log::debug!(
            "loaded {} candidate records from {}",
            records.len(),
            self.path.display()
        );
        Ok(select(&records, filter, self.clock.now()))
    }
}
