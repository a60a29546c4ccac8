//! Domain identifiers (strongly-typed IDs).
//!
//! - `CandidateId`: the transport's own user identifier (Telegram chat id).
//!   Supplied by the candidate source and never interpreted by the engine.
//! - `RunId`: ULID ベースの ID。生成順でソート可能なので、ログ上で
//!   run の前後関係がそのまま読める。
//!
//! `Id<T>` は Phantom type パターン: `T` は実行時には使わないマーカー型で、
//! コンパイル時に別種の ID を混同できないようにする。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Identifier of one user subject to probing.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(i64);

impl CandidateId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for CandidateId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"run-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ULID ID 型
#[repr(transparent)]
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

// derive だと `T: Clone` を要求してしまうので手で実装する
impl<T: IdMarker> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: IdMarker> Copy for Id<T> {}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Run のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Run {}

impl IdMarker for Run {
    fn prefix() -> &'static str {
        "run-"
    }
}

/// Identifier of one probing run (start → Completed/Cancelled/Failed).
pub type RunId = Id<Run>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_displays_with_prefix() {
        let ulid = Ulid::new();
        let run = RunId::from_ulid(ulid);
        assert_eq!(run.as_ulid(), ulid);
        assert_eq!(run.to_string(), format!("run-{ulid}"));
    }

    #[test]
    fn run_ids_are_sortable_by_creation_time() {
        let first = RunId::from_ulid(Ulid::from_parts(1_000, 7));
        let second = RunId::from_ulid(Ulid::from_parts(2_000, 3));
        assert!(first < second);
    }

    #[test]
    fn candidate_id_is_transparent_in_json() {
        let id = CandidateId::new(-100123);
        assert_eq!(serde_json::to_string(&id).unwrap(), "-100123");
        let back: CandidateId = serde_json::from_str("42").unwrap();
        assert_eq!(back, CandidateId::new(42));
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        assert_eq!(std::mem::size_of::<RunId>(), std::mem::size_of::<Ulid>());
    }
}
