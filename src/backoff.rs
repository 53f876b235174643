//! Exponential reconnect backoff with jitter.
//!
//! Delay for attempt `n` (counting from zero) is
//! `min(max, base * 2^n) + jitter`, with jitter drawn uniformly from
//! `[0, jitter_bound)` so that many clients dropped at once do not all
//! reconnect in the same instant.

use std::time::Duration;

use rand::Rng;

/// Reconnect delay policy owned by the supervisory loop.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter_bound: Duration,
    attempts: u32,
}

impl Backoff {
    /// Create a backoff policy.
    pub fn new(base: Duration, max: Duration, jitter_bound: Duration) -> Self {
        Self {
            base,
            max,
            jitter_bound,
            attempts: 0,
        }
    }

    /// Delay before the next attempt. Increments the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.raw_delay(self.attempts) + self.jitter();
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Number of delays handed out since the last reset.
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Forget previous failures.
    #[inline]
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Un-jittered delay for the given attempt number.
    pub fn raw_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |d| d.min(self.max))
    }

    fn jitter(&self) -> Duration {
        let bound = self.jitter_bound.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..bound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Backoff {
        Backoff::new(
            Duration::from_secs(1),
            Duration::from_secs(30),
            Duration::from_millis(500),
        )
    }

    #[test]
    fn test_delays_bounded_by_cap_plus_jitter() {
        let mut backoff = policy();

        for n in 0..=6u32 {
            let delay = backoff.next_delay();
            let floor = Duration::from_secs(30).min(Duration::from_secs(1 << n));
            assert!(delay >= floor, "attempt {n}: {delay:?} < {floor:?}");
            assert!(
                delay < floor + Duration::from_millis(500),
                "attempt {n}: {delay:?} over jitter bound"
            );
        }
        assert_eq!(backoff.attempts(), 7);
    }

    #[test]
    fn test_raw_delay_non_decreasing_and_capped() {
        let backoff = policy();
        let mut previous = Duration::ZERO;

        for n in 0..64u32 {
            let delay = backoff.raw_delay(n);
            assert!(delay >= previous);
            assert!(delay <= Duration::from_secs(30));
            previous = delay;
        }
        assert_eq!(backoff.raw_delay(200), Duration::from_secs(30));
    }

    #[test]
    fn test_reset_zeroes_attempts() {
        let mut backoff = policy();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(backoff.next_delay() < Duration::from_millis(1500));
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let mut backoff = Backoff::new(
            Duration::from_millis(100),
            Duration::from_secs(1),
            Duration::ZERO,
        );
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.next_delay(), Duration::from_millis(800));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }
}
