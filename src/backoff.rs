use std::time::Duration;

use rand::Rng;

use crate::ClientOptions;

/// Exponential backoff with attempt-scaled jitter.
///
/// `backoff(n)` is `2^n` seconds and `jitter(n)` is a uniform value in
/// `[0, max_jitter_ms)` multiplied by `n`, in milliseconds. Both are pure
/// functions of the attempt index apart from the random draw.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BackoffPolicy {
    max_jitter_ms: u64,
    max_backoff: Option<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_options(&ClientOptions::default())
    }
}

impl BackoffPolicy {
    pub fn new(max_jitter_ms: u64) -> Self {
        Self {
            max_jitter_ms,
            max_backoff: None,
        }
    }

    pub fn from_options(options: &ClientOptions) -> Self {
        Self {
            max_jitter_ms: options.max_jitter_ms,
            max_backoff: options.max_backoff,
        }
    }

    /// Caps every backoff at `max_backoff`. Jitter is added on top.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = Some(max_backoff);
        self
    }

    pub fn max_jitter_ms(&self) -> u64 {
        self.max_jitter_ms
    }

    /// `2^attempt` seconds, saturating at `u64::MAX` seconds.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exp = u32::try_from(attempt).unwrap_or(u32::MAX);
        let secs = 1u64.checked_shl(exp).unwrap_or(u64::MAX);
        let backoff = Duration::from_secs(secs);
        match self.max_backoff {
            Some(cap) => backoff.min(cap),
            None => backoff,
        }
    }

    pub fn jitter(&self, attempt: usize) -> Duration {
        self.jitter_with(attempt, &mut rand::thread_rng())
    }

    /// Jitter drawn from a caller-supplied random source.
    pub fn jitter_with<R: Rng + ?Sized>(&self, attempt: usize, rng: &mut R) -> Duration {
        if self.max_jitter_ms == 0 || attempt == 0 {
            return Duration::ZERO;
        }
        let factor = rng.gen_range(0..self.max_jitter_ms);
        Duration::from_millis(factor.saturating_mul(attempt as u64))
    }

    /// Total wait before the attempt following `attempt`.
    pub fn delay(&self, attempt: usize) -> Duration {
        self.backoff(attempt).saturating_add(self.jitter(attempt))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{rngs::StdRng, SeedableRng};

    use super::BackoffPolicy;

    #[test]
    fn backoff_doubles_from_one_second() {
        let policy = BackoffPolicy::new(10);
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(5), Duration::from_secs(32));
    }

    #[test]
    fn backoff_is_strictly_increasing() {
        let policy = BackoffPolicy::new(10);
        for attempt in 0..40 {
            assert!(policy.backoff(attempt) < policy.backoff(attempt + 1));
        }
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let policy = BackoffPolicy::new(10);
        assert_eq!(policy.backoff(64), Duration::from_secs(u64::MAX));
        assert_eq!(policy.backoff(usize::MAX), Duration::from_secs(u64::MAX));
        let _ = policy.delay(200);
    }

    #[test]
    fn backoff_respects_cap() {
        let policy = BackoffPolicy::new(10).with_max_backoff(Duration::from_secs(5));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(5));
        assert_eq!(policy.backoff(30), Duration::from_secs(5));
    }

    #[test]
    fn jitter_is_zero_on_first_attempt() {
        let policy = BackoffPolicy::new(10);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(policy.jitter_with(0, &mut rng), Duration::ZERO);
        }
    }

    #[test]
    fn jitter_stays_within_scaled_bound() {
        let policy = BackoffPolicy::new(10);
        let mut rng = StdRng::seed_from_u64(42);
        for attempt in 1..8usize {
            let bound = Duration::from_millis(10 * attempt as u64);
            for _ in 0..200 {
                let jitter = policy.jitter_with(attempt, &mut rng);
                assert!(jitter < bound, "{jitter:?} >= {bound:?}");
                assert_eq!(jitter.as_millis() % attempt as u128, 0);
            }
        }
    }

    #[test]
    fn zero_max_jitter_disables_jitter() {
        let policy = BackoffPolicy::new(0);
        assert_eq!(policy.jitter(3), Duration::ZERO);
        assert_eq!(policy.delay(3), Duration::from_secs(8));
    }
}
