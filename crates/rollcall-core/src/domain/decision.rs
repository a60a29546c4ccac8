//! Decision model: what happens to a job after a rate-limit signal.
//!
//! The Decider is a pure function of the job and the signal. Carrying the
//! decision out (counting the retry event, registering the timer) is the
//! worker's job.

use std::time::Duration;

use super::job::ProbeJob;
use crate::queue::RetryPolicy;

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Re-enqueue `job` once `delay` has elapsed.
    Retry { job: ProbeJob, delay: Duration },

    /// Retry budget exhausted: record the candidate as OtherError.
    GiveUp { reason: String },
}

pub trait Decider: Send + Sync {
    fn decide(&self, job: ProbeJob, retry_after: Duration) -> Decision;
}

/// Attempt-bounded retry driven by [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, job: ProbeJob, retry_after: Duration) -> Decision {
        if self.retry_policy.may_retry(job.attempt) {
            Decision::Retry {
                job: job.next_attempt(),
                delay: self.retry_policy.delay_for(job.attempt, retry_after),
            }
        } else {
            Decision::GiveUp {
                reason: format!(
                    "rate limited after {}/{} retries",
                    job.attempt, self.retry_policy.max_retries
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CandidateId;

    #[test]
    fn retries_until_budget_is_spent() {
        let decider = DefaultDecider::default();
        let job = ProbeJob::first(CandidateId::new(1));

        let Decision::Retry { job: next, delay } = decider.decide(job, Duration::from_secs(2))
        else {
            panic!("expected retry");
        };
        assert_eq!(next.attempt, 1);
        assert_eq!(delay, Duration::from_secs(2));

        let exhausted = ProbeJob {
            id: job.id,
            attempt: 3,
        };
        assert!(matches!(
            decider.decide(exhausted, Duration::from_secs(2)),
            Decision::GiveUp { reason } if reason.contains("3/3")
        ));
    }

    #[test]
    fn zero_max_retries_never_retries() {
        let decider = DefaultDecider::new(RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        });
        let job = ProbeJob::first(CandidateId::new(1));
        assert!(matches!(
            decider.decide(job, Duration::from_secs(1)),
            Decision::GiveUp { .. }
        ));
    }
}
