//! Aggregator: the run's counters and their change notifications.
//!
//! The [`Aggregate`] lives inside a `watch` channel. `send_modify` takes the
//! channel's internal lock, so each operation is one atomic read-modify-write
//! and every observer sees a consistent copy.

use tokio::sync::watch;

use crate::domain::{Aggregate, TerminalKind};

#[derive(Debug)]
pub struct Aggregator {
    tx: watch::Sender<Aggregate>,
}

impl Aggregator {
    pub fn new(total: u64) -> Self {
        let (tx, _rx) = watch::channel(Aggregate::with_total(total));
        Self { tx }
    }

    /// `processed += 1` and the matching bucket `+= 1`.
    pub fn record_terminal(&self, kind: TerminalKind) {
        self.tx.send_modify(|agg| agg.apply_terminal(kind));
    }

    /// Counts one retry event; `processed` is untouched.
    pub fn record_rate_limited_retry(&self) {
        self.tx.send_modify(|agg| agg.rate_limited_retries += 1);
    }

    pub fn snapshot(&self) -> Aggregate {
        *self.tx.borrow()
    }

    /// Receiver that wakes on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Aggregate> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn concurrent_records_are_not_lost() {
        let aggregator = Arc::new(Aggregator::new(400));
        let mut joins = Vec::new();
        for i in 0..4 {
            let agg = Arc::clone(&aggregator);
            joins.push(tokio::spawn(async move {
                for n in 0..100 {
                    let kind = match (i + n) % 4 {
                        0 => TerminalKind::Alive,
                        1 => TerminalKind::Blocked,
                        2 => TerminalKind::Deleted,
                        _ => TerminalKind::OtherError,
                    };
                    agg.record_terminal(kind);
                    if n % 10 == 0 {
                        agg.record_rate_limited_retry();
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }
        for j in joins {
            j.await.unwrap();
        }

        let snap = aggregator.snapshot();
        assert_eq!(snap.processed, 400);
        assert!(snap.is_consistent());
        assert_eq!(snap.rate_limited_retries, 40);
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let aggregator = Aggregator::new(2);
        let mut rx = aggregator.subscribe();

        aggregator.record_terminal(TerminalKind::Blocked);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().blocked, 1);

        aggregator.record_rate_limited_retry();
        rx.changed().await.unwrap();
        let seen = *rx.borrow_and_update();
        assert_eq!(seen.processed, 1);
        assert_eq!(seen.rate_limited_retries, 1);
    }
}
