//! Exponential backoff with jitter for reopening watch streams.
//!
//! A watch consumer keeps one [`Backoff`] for its lifetime: every terminated
//! stream asks it for the next delay, every healthy stream resets it.

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnecting a terminated watch stream.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of consecutive reconnect attempts (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay between reconnects
    pub initial_delay: Duration,
    /// Maximum delay between reconnects
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Start a fresh backoff sequence for this config.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.clone())
    }
}

/// Stateful backoff sequence.
#[derive(Debug)]
pub struct Backoff {
    config: RetryConfig,
    attempt: u32,
    delay: Duration,
}

impl Backoff {
    /// Create a backoff sequence starting at the initial delay.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        let delay = config.initial_delay;
        Self {
            config,
            attempt: 0,
            delay,
        }
    }

    /// Delay before the next attempt, or `None` once `max_attempts` is used up.
    ///
    /// The returned delay carries 0.5x to 1.5x jitter.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempt >= self.config.max_attempts {
            return None;
        }
        self.attempt += 1;

        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        let jittered = Duration::from_secs_f64(self.delay.as_secs_f64() * jitter);

        self.delay = Duration::from_secs_f64(
            (self.delay.as_secs_f64() * self.config.backoff_multiplier)
                .min(self.config.max_delay.as_secs_f64()),
        );

        Some(jittered)
    }

    /// Forget previous failures.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.delay = self.config.initial_delay;
    }

    /// Attempts consumed since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn stops_after_max_attempts() {
        let mut backoff = config(2).backoff();
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert_eq!(backoff.attempts(), 2);
    }

    #[test]
    fn zero_means_infinite() {
        let mut backoff = config(0).backoff();
        for _ in 0..100 {
            assert!(backoff.next_delay().is_some());
        }
    }

    #[test]
    fn delays_grow_and_are_capped() {
        let mut backoff = config(0).backoff();
        let delays: Vec<_> = (0..6).filter_map(|_| backoff.next_delay()).collect();

        // 100ms with jitter
        assert!(delays[0] >= Duration::from_millis(50) && delays[0] <= Duration::from_millis(150));
        // capped at 400ms, 1.5x jitter at most
        for delay in &delays[2..] {
            assert!(*delay <= Duration::from_millis(600));
            assert!(*delay >= Duration::from_millis(200));
        }
    }

    #[test]
    fn reset_restores_initial_delay() {
        let mut backoff = config(1).backoff();
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        let delay = backoff.next_delay().unwrap();
        assert!(delay <= Duration::from_millis(150));
    }
}
