//! Wake-up delay policy for the scheduler.
//!
//! - Success: the base interval.
//! - n-th consecutive transient failure: `min(base * 2^(n-1), max_backoff)`.
//! - Rate limited: the platform-provided retry-after.
//!
//! Random jitter is added on top of every delay so several instances do not
//! hit the API in lockstep.

use std::time::Duration;

use rand::Rng;

use crate::models::WatchConfig;

/// Floor for platform-provided waits.
const MIN_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    pub interval: Duration,
    pub jitter: Duration,
    pub base: Duration,
    pub max_backoff: Duration,
}

impl From<&WatchConfig> for BackoffConfig {
    fn from(config: &WatchConfig) -> Self {
        Self {
            interval: config.interval(),
            jitter: config.jitter(),
            base: config.backoff_base(),
            max_backoff: config.max_backoff(),
        }
    }
}

/// Tracks consecutive failures and computes the next delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    failures: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Consecutive transient failures since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay after a fully successful cycle; resets the failure count.
    pub fn on_success(&mut self) -> Duration {
        self.failures = 0;
        self.config.interval
    }

    /// Delay after a transient failure.
    pub fn on_transient(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let exponent = (self.failures - 1).min(31);
        self.config
            .base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.config.max_backoff)
            .min(self.config.max_backoff)
    }

    /// Delay after the platform asked us to wait.
    pub fn on_rate_limited(&mut self, retry_after: Duration) -> Duration {
        retry_after.max(MIN_RETRY_AFTER)
    }

    /// A random delay in `[0, jitter]`.
    pub fn jitter(&self) -> Duration {
        self.jitter_with(&mut rand::thread_rng())
    }

    pub fn jitter_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let max_ms = self.config.jitter.as_millis().min(u128::from(u64::MAX)) as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(0..=max_ms))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn config() -> BackoffConfig {
        BackoffConfig {
            interval: Duration::from_secs(600),
            jitter: Duration::from_secs(5),
            base: Duration::from_secs(10),
            max_backoff: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_transient_growth_is_monotonic_and_bounded() {
        let mut backoff = Backoff::new(config());
        let delays: Vec<Duration> = (0..40).map(|_| backoff.on_transient()).collect();

        assert_eq!(delays[0], Duration::from_secs(10));
        assert_eq!(delays[1], Duration::from_secs(20));
        assert_eq!(delays[2], Duration::from_secs(40));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(300)));
        assert_eq!(*delays.last().unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn test_success_resets() {
        let mut backoff = Backoff::new(config());
        backoff.on_transient();
        backoff.on_transient();
        assert_eq!(backoff.failures(), 2);

        assert_eq!(backoff.on_success(), Duration::from_secs(600));
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.on_transient(), Duration::from_secs(10));
    }

    #[test]
    fn test_rate_limited_uses_retry_after() {
        let mut backoff = Backoff::new(config());
        assert_eq!(
            backoff.on_rate_limited(Duration::from_secs(1234)),
            Duration::from_secs(1234)
        );
        assert_eq!(backoff.on_rate_limited(Duration::ZERO), MIN_RETRY_AFTER);
        assert_eq!(backoff.failures(), 0);
    }

    #[test]
    fn test_jitter_within_bound() {
        let backoff = Backoff::new(config());
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(backoff.jitter_with(&mut rng) <= Duration::from_secs(5));
        }
    }

    #[test]
    fn test_zero_jitter() {
        let backoff = Backoff::new(BackoffConfig {
            jitter: Duration::ZERO,
            ..config()
        });
        assert_eq!(backoff.jitter(), Duration::ZERO);
    }
}
