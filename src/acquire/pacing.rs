//! Admission gate built from a library's pacing constraint.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::library::Pacing;

/// Gate every page fetch must pass before calling the library
#[derive(Clone)]
pub enum PacingGate {
    /// At most N fetches hold a slot at once
    Slots(Arc<Semaphore>),

    /// Fetches start at a steady cadence
    Ticker(Arc<DefaultDirectRateLimiter>),

    /// No pacing at all (zero interval)
    Open,
}

impl std::fmt::Debug for PacingGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacingGate::Slots(slots) => f
                .debug_tuple("Slots")
                .field(&slots.available_permits())
                .finish(),
            PacingGate::Ticker(_) => f.write_str("Ticker"),
            PacingGate::Open => f.write_str("Open"),
        }
    }
}

/// Proof of admission. For slot gates the slot is released on drop.
#[derive(Debug)]
pub struct Admission {
    _permit: Option<OwnedSemaphorePermit>,
}

impl PacingGate {
    pub fn new(pacing: Pacing) -> Self {
        match pacing {
            Pacing::MaxConcurrent(n) => PacingGate::Slots(Arc::new(Semaphore::new(n.get()))),
            Pacing::MinInterval(interval) => match Quota::with_period(interval) {
                Some(quota) => {
                    PacingGate::Ticker(Arc::new(RateLimiter::direct(quota.allow_burst(nonzero!(1u32)))))
                }
                None => PacingGate::Open,
            },
        }
    }

    /// Wait until the pacing constraint admits one more fetch
    pub async fn admit(&self) -> Admission {
        match self {
            PacingGate::Slots(slots) => Admission {
                // The semaphore is never closed, so acquiring only fails if
                // that invariant is broken; degrade to an unpaced admission.
                _permit: Arc::clone(slots).acquire_owned().await.ok(),
            },
            PacingGate::Ticker(limiter) => {
                limiter.until_ready().await;
                Admission { _permit: None }
            }
            PacingGate::Open => Admission { _permit: None },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_slots_bound_admissions() {
        let gate = PacingGate::new(Pacing::MaxConcurrent(NonZeroUsize::new(2).unwrap()));

        let first = gate.admit().await;
        let _second = gate.admit().await;

        let mut third = tokio_test::task::spawn(gate.admit());
        tokio_test::assert_pending!(third.poll());

        drop(first);
        assert!(third.is_woken());
        tokio_test::assert_ready!(third.poll());
    }

    #[tokio::test]
    async fn test_ticker_spaces_admissions() {
        let interval = Duration::from_millis(40);
        let gate = PacingGate::new(Pacing::MinInterval(interval));

        let start = Instant::now();
        for _ in 0..4 {
            gate.admit().await;
        }

        assert!(start.elapsed() >= interval * 3 - Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_zero_interval_is_open() {
        let gate = PacingGate::new(Pacing::MinInterval(Duration::ZERO));
        assert!(matches!(gate, PacingGate::Open));
        gate.admit().await;
    }
}
