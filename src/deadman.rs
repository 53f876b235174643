//! Resettable liveness watchdog.
//!
//! The timer is a single re-armable [`Sleep`]. Re-arming moves the deadline
//! in place, so there is never a stale expiry left buffered from a previous
//! arm: a fire observed by [`DeadmanTimer::elapsed`] always belongs to the
//! current deadline.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep_until, Instant, Sleep};

/// Countdown that fires when no liveness signal arrived within `timeout`.
#[derive(Debug)]
pub struct DeadmanTimer {
    timeout: Duration,
    sleep: Pin<Box<Sleep>>,
}

impl DeadmanTimer {
    /// Create a timer armed to fire `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sleep: Box::pin(sleep_until(Instant::now() + timeout)),
        }
    }

    /// Re-arm the countdown from now.
    pub fn reset(&mut self) {
        let deadline = Instant::now() + self.timeout;
        self.sleep.as_mut().reset(deadline);
    }

    /// Resolves once the current deadline passes.
    ///
    /// Cancel-safe: dropping the future (e.g. losing a `select!`) and
    /// resetting the timer afterwards leaves no pending fire behind.
    pub async fn elapsed(&mut self) {
        self.sleep.as_mut().await;
    }

    /// Whether the current deadline has already passed.
    pub fn is_expired(&self) -> bool {
        self.sleep.is_elapsed() || Instant::now() >= self.sleep.deadline()
    }

    /// Time left before the timer fires.
    pub fn remaining(&self) -> Duration {
        self.sleep.deadline().saturating_duration_since(Instant::now())
    }

    /// Configured timeout.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
