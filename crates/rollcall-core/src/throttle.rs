//! Throttle: the shared outbound rate limiter.
//!
//! Slots are handed out GCRA-style. A theoretical arrival time (TAT) advances
//! by one emission interval (`period / max_calls`) per grant, and a caller may
//! go early by at most `burst - 1` intervals. On top of that an optional
//! per-destination gap keeps two probes to the same chat apart.
//!
//! A grant is a reservation: the slot is booked under the lock, then the
//! caller sleeps until that instant without holding it. Nothing is rejected.
//! A caller held back by its destination's gap books nothing; it sleeps until
//! the gap has passed and reserves again, so other destinations keep the
//! global slots it would have blocked.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::CandidateId;
use crate::queue::retry::millis;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Global ceiling: at most `max_calls` per `period`.
    pub max_calls: u32,
    #[serde(with = "millis")]
    pub period: Duration,
    /// Calls that may go out back to back before pacing kicks in.
    pub burst: u32,
    /// Minimum spacing between two probes to the same destination.
    #[serde(default, with = "optional_millis")]
    pub per_destination_interval: Option<Duration>,
}

impl Default for ThrottleConfig {
    /// Bot API broadcast guidance: stay under 30 messages per second overall
    /// and one per second per chat.
    fn default() -> Self {
        Self {
            max_calls: 25,
            period: Duration::from_secs(1),
            burst: 5,
            per_destination_interval: Some(Duration::from_secs(1)),
        }
    }
}

impl ThrottleConfig {
    pub fn emission_interval(&self) -> Duration {
        self.period / self.max_calls.max(1)
    }
}

/// The run was cancelled while waiting for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("throttle wait cancelled")]
pub struct Cancelled;

struct ThrottleState {
    tat: Option<Instant>,
    last_by_destination: HashMap<CandidateId, Instant>,
    prune_at: usize,
}

const INITIAL_PRUNE_AT: usize = 4096;

pub struct Throttle {
    emission_interval: Duration,
    tolerance: Duration,
    per_destination_interval: Option<Duration>,
    state: Mutex<ThrottleState>,
}

impl Throttle {
    pub fn new(config: &ThrottleConfig) -> Self {
        let emission_interval = config.emission_interval();
        Self {
            emission_interval,
            tolerance: emission_interval.saturating_mul(config.burst.max(1) - 1),
            per_destination_interval: config.per_destination_interval,
            state: Mutex::new(ThrottleState {
                tat: None,
                last_by_destination: HashMap::new(),
                prune_at: INITIAL_PRUNE_AT,
            }),
        }
    }

    /// Wait until a probe to `destination` may be sent.
    ///
    /// Returns `Err(Cancelled)` as soon as `cancel` fires, whether before or
    /// during the wait.
    pub async fn acquire(
        &self,
        destination: CandidateId,
        cancel: &CancellationToken,
    ) -> Result<(), Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        loop {
            let (wake_at, granted) = match self.reserve(destination).await {
                Reservation::Granted(slot) => (slot, true),
                Reservation::NotBefore(at) => (at, false),
            };
            if wake_at > Instant::now() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Cancelled),
                    _ = tokio::time::sleep_until(wake_at) => {}
                }
            }
            if granted {
                return Ok(());
            }
        }
    }

    async fn reserve(&self, destination: CandidateId) -> Reservation {
        let now = Instant::now();
        let mut state = self.state.lock().await;

        let tat = state.tat.map_or(now, |tat| tat.max(now));
        let slot = tat
            .checked_sub(self.tolerance)
            .map_or(now, |earliest| earliest.max(now));

        if let Some(gap) = self.per_destination_interval {
            if let Some(last) = state.last_by_destination.get(&destination) {
                let not_before = *last + gap;
                if not_before > slot {
                    return Reservation::NotBefore(not_before);
                }
            }
            state.last_by_destination.insert(destination, slot);

            if state.last_by_destination.len() >= state.prune_at {
                state
                    .last_by_destination
                    .retain(|_, last| *last + gap > now);
                state.prune_at = (state.last_by_destination.len() * 2).max(INITIAL_PRUNE_AT);
            }
        }

        state.tat = Some(tat + self.emission_interval);
        Reservation::Granted(slot)
    }
}

enum Reservation {
    /// Slot booked; send at this instant.
    Granted(Instant),
    /// The destination's gap runs past the next global slot. Nothing booked.
    NotBefore(Instant),
}

mod optional_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis().min(u128::from(u64::MAX)) as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The timer wheel rounds deadlines up to the next millisecond.
    fn assert_elapsed(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed <= expected + Duration::from_millis(1),
            "elapsed {elapsed:?}, expected {expected:?}"
        );
    }

    fn config(max_calls: u32, burst: u32, per_destination: Option<Duration>) -> ThrottleConfig {
        ThrottleConfig {
            max_calls,
            period: Duration::from_secs(1),
            burst,
            per_destination_interval: per_destination,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_goes_out_immediately_then_paces() {
        let throttle = Throttle::new(&config(10, 3, None));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        for id in 0..3 {
            throttle.acquire(CandidateId::new(id), &cancel).await.unwrap();
        }
        assert_elapsed(start, Duration::ZERO);

        throttle.acquire(CandidateId::new(3), &cancel).await.unwrap();
        assert_elapsed(start, Duration::from_millis(100));

        throttle.acquire(CandidateId::new(4), &cancel).await.unwrap();
        assert_elapsed(start, Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn global_ceiling_holds_over_a_window() {
        let throttle = Throttle::new(&config(20, 1, None));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        for id in 0..41 {
            throttle.acquire(CandidateId::new(id), &cancel).await.unwrap();
        }
        // 41 calls at 20/s with no burst: the last one is due at 2s.
        assert_elapsed(start, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn same_destination_is_spaced() {
        let throttle = Throttle::new(&config(1000, 10, Some(Duration::from_secs(1))));
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let id = CandidateId::new(77);

        throttle.acquire(id, &cancel).await.unwrap();
        throttle.acquire(CandidateId::new(78), &cancel).await.unwrap();
        assert_elapsed(start, Duration::ZERO);

        throttle.acquire(id, &cancel).await.unwrap();
        assert_elapsed(start, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_destination_does_not_hold_back_others() {
        let throttle = std::sync::Arc::new(Throttle::new(&config(
            10,
            1,
            Some(Duration::from_secs(1)),
        )));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        throttle.acquire(CandidateId::new(77), &cancel).await.unwrap();

        let same_chat = {
            let throttle = std::sync::Arc::clone(&throttle);
            let cancel = cancel.clone();
            tokio::spawn(async move { throttle.acquire(CandidateId::new(77), &cancel).await })
        };
        tokio::task::yield_now().await;

        // 77 の待ちに引きずられず、次のグローバル枠（100ms）で通る
        throttle.acquire(CandidateId::new(78), &cancel).await.unwrap();
        assert_elapsed(start, Duration::from_millis(100));

        same_chat.await.unwrap().unwrap();
        assert_elapsed(start, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_pending_wait() {
        let throttle = std::sync::Arc::new(Throttle::new(&ThrottleConfig {
            max_calls: 1,
            period: Duration::from_secs(3600),
            burst: 1,
            per_destination_interval: None,
        }));
        let cancel = CancellationToken::new();

        throttle.acquire(CandidateId::new(1), &cancel).await.unwrap();

        let waiter = {
            let throttle = std::sync::Arc::clone(&throttle);
            let cancel = cancel.clone();
            tokio::spawn(async move { throttle.acquire(CandidateId::new(2), &cancel).await })
        };
        tokio::task::yield_now().await;
        cancel.cancel();

        assert_eq!(waiter.await.unwrap(), Err(Cancelled));
        assert_eq!(
            throttle.acquire(CandidateId::new(3), &cancel).await,
            Err(Cancelled)
        );
    }

    #[test]
    fn config_deserializes_millis() {
        let cfg: ThrottleConfig = serde_json::from_str(
            r#"{"max_calls":30,"period":1000,"burst":2,"per_destination_interval":1500}"#,
        )
        .unwrap();
        assert_eq!(cfg.emission_interval(), Duration::from_nanos(33_333_333));
        assert_eq!(cfg.per_destination_interval, Some(Duration::from_millis(1500)));

        let cfg: ThrottleConfig =
            serde_json::from_str(r#"{"max_calls":30,"period":1000,"burst":2}"#).unwrap();
        assert_eq!(cfg.per_destination_interval, None);
    }
}
