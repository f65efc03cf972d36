//! Exponential backoff with jitter for venue reconnection.
//!
//! Adapted from the teacher's `resilience::backoff::{BackoffConfig,
//! ExponentialBackoff}`: same shape (initial/max delay, multiplier,
//! optional retry cap, multiplicative jitter), generalised from the
//! teacher's single Huginn feed to any [`crate::feeds::VenueConnector`].

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_retries: Option<usize>,
    pub jitter_factor: f64,
}

impl BackoffConfig {
    pub fn default_config() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_retries: None,
            jitter_factor: 0.2,
        }
    }

    pub fn aggressive() -> Self {
        Self {
            initial_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(5),
            multiplier: 1.5,
            max_retries: None,
            jitter_factor: 0.3,
        }
    }

    pub fn conservative() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(120),
            multiplier: 2.5,
            max_retries: None,
            jitter_factor: 0.1,
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Stateful backoff sequence for a single connection attempt loop.
pub struct ExponentialBackoff {
    config: BackoffConfig,
    current_attempt: usize,
    current_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self::with_config(BackoffConfig::default_config())
    }

    pub fn with_config(config: BackoffConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            current_attempt: 0,
            current_delay,
        }
    }

    /// Returns the next delay to wait, or `None` if `max_retries` has been
    /// exhausted. Advances internal state on every call.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.config.max_retries {
            if self.current_attempt >= max {
                return None;
            }
        }

        let delay = self.jittered(self.current_delay);
        self.current_attempt += 1;
        let scaled = self.current_delay.mul_f64(self.config.multiplier);
        self.current_delay = scaled.min(self.config.max_delay);
        Some(delay)
    }

    fn jittered(&self, base: Duration) -> Duration {
        let jitter_range = base.as_secs_f64() * self.config.jitter_factor;
        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        let jittered_secs = (base.as_secs_f64() + jitter).max(0.0);
        Duration::from_secs_f64(jittered_secs)
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
        self.current_delay = self.config.initial_delay;
    }

    pub fn attempt_number(&self) -> usize {
        self.current_attempt
    }

    pub fn can_retry(&self) -> bool {
        match self.config.max_retries {
            Some(max) => self.current_attempt < max,
            None => true,
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_caps() {
        let config = BackoffConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_retries: None,
            jitter_factor: 0.0,
        };
        let mut backoff = ExponentialBackoff::with_config(config);

        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(400)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(500)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn respects_max_retries() {
        let config = BackoffConfig {
            max_retries: Some(2),
            jitter_factor: 0.0,
            ..BackoffConfig::default_config()
        };
        let mut backoff = ExponentialBackoff::with_config(config);

        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert!(!backoff.can_retry());
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut backoff = ExponentialBackoff::new();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt_number(), 0);
    }
}
