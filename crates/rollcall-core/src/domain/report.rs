//! End-of-run report and its operator-facing rendering.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::aggregate::{Aggregate, RunState};
use super::ids::RunId;

/// Final result of a run that was not run-fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub state: RunState,
    pub aggregate: Aggregate,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn summary(&self) -> RunSummary<'_> {
        RunSummary {
            state: self.state,
            aggregate: &self.aggregate,
        }
    }
}

/// Text rendering of a final aggregate.
///
/// ```text
/// Check Complete!
///
/// Total users: 10
/// Alive: 7 (70.0%)
/// Blocked bot: 2 (20.0%)
/// Deleted account: 1 (10.0%)
/// ```
pub struct RunSummary<'a> {
    pub state: RunState,
    pub aggregate: &'a Aggregate,
}

impl RunSummary<'_> {
    fn header(&self) -> &'static str {
        match self.state {
            RunState::Completed => "Check Complete!",
            RunState::Cancelled => "Check Cancelled (partial result)",
            RunState::Failed => "Check Failed (incomplete result)",
            RunState::Running => "Checking alive users...",
        }
    }
}

fn pct(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

impl fmt::Display for RunSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let agg = self.aggregate;
        if agg.total == 0 && self.state == RunState::Completed {
            return f.write_str("No users to check.");
        }

        writeln!(f, "{}\n", self.header())?;
        writeln!(f, "Total users: {}", agg.total)?;
        if self.state != RunState::Completed {
            writeln!(f, "Processed: {}", agg.processed)?;
        }
        writeln!(f, "Alive: {} ({:.1}%)", agg.alive, pct(agg.alive, agg.total))?;
        writeln!(
            f,
            "Blocked bot: {} ({:.1}%)",
            agg.blocked,
            pct(agg.blocked, agg.total)
        )?;
        write!(
            f,
            "Deleted account: {} ({:.1}%)",
            agg.deleted,
            pct(agg.deleted, agg.total)
        )?;
        if agg.other_errors > 0 {
            write!(
                f,
                "\nOther errors: {} ({:.1}%)",
                agg.other_errors,
                pct(agg.other_errors, agg.total)
            )?;
        }
        if agg.rate_limited_retries > 0 {
            write!(f, "\n\nRate limited retries: {}", agg.rate_limited_retries)?;
        }
        Ok(())
    }
}
