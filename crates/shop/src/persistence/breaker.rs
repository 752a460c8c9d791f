//! Consecutive-failure circuit breaker guarding the primary store.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Calls go to the primary.
    Closed,
    /// Calls skip the primary until the cooldown ends.
    Open,
    /// One probe call is on its way to the primary.
    HalfOpen,
}

#[derive(Debug, Default)]
struct Inner {
    consecutive_failures: u32,
    open_until: Option<Instant>,
    probing: bool,
}

/// Opens after `threshold` consecutive failures and lets a single probe
/// through once `cooldown` has passed.
///
/// While a probe is in flight the breaker is re-armed for another cooldown,
/// so a probe that never reports back cannot wedge it half-open.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// A closed breaker. A `threshold` of zero is treated as one.
    #[must_use]
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Whether the next call may try the primary.
    pub async fn allow(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.open_until {
            None => true,
            Some(until) if Instant::now() < until => false,
            Some(_) => {
                inner.probing = true;
                inner.open_until = Some(Instant::now() + self.cooldown);
                true
            }
        }
    }

    /// The primary answered; close the breaker.
    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        *inner = Inner::default();
    }

    /// The primary was unreachable. Returns `true` if this call opened the
    /// breaker.
    pub async fn record_failure(&self) -> bool {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        let trip = inner.probing || inner.consecutive_failures >= self.threshold;
        if trip {
            inner.open_until = Some(Instant::now() + self.cooldown);
            inner.probing = false;
        }
        trip
    }

    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub async fn state(&self) -> BreakerState {
        let inner = self.inner.lock().await;
        match inner.open_until {
            None => BreakerState::Closed,
            Some(_) if inner.probing => BreakerState::HalfOpen,
            Some(_) => BreakerState::Open,
        }
    }

    pub async fn consecutive_failures(&self) -> u32 {
        self.inner.lock().await.consecutive_failures
    }
}
