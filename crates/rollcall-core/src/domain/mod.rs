//! Domain model (ids, filter, jobs, outcomes, counters, decisions, reports).
//!
//! Nothing in here knows about tokio, workers or the transport: these are the
//! values the engine passes around and the rules that relate them.

pub mod aggregate;
pub mod decision;
pub mod filter;
pub mod ids;
pub mod job;
pub mod outcome;
pub mod report;

pub use aggregate::{Aggregate, ProgressSnapshot, RunState};
pub use decision::{Decider, Decision, DefaultDecider};
pub use filter::{CandidateFilter, ParseFilterError};
pub use ids::{CandidateId, Id, IdMarker, RunId};
pub use job::ProbeJob;
pub use outcome::{Outcome, TerminalKind};
pub use report::{RunReport, RunSummary};
