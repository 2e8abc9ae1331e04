//! Exponential Backoff
//!
//! Delay schedule shared by the WebSocket connect loop and the REST retry
//! loop. Each delay is the previous one times `multiplier`, capped at
//! `max_delay`, with optional ± jitter.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::FeedSettings;

/// Backoff schedule parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Delays handed out before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

impl BackoffConfig {
    /// Connect schedule for the ticker stream.
    #[must_use]
    pub fn for_feed(settings: &FeedSettings) -> Self {
        Self {
            initial_delay: settings.connect_delay_initial,
            max_delay: settings.connect_delay_max,
            max_attempts: settings.connect_max_attempts,
            ..Self::default()
        }
    }

    /// Retry schedule for REST calls.
    ///
    /// Attempts are bounded by the caller, so the schedule itself never
    /// runs out.
    #[must_use]
    pub fn for_rest() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// Stateful backoff schedule.
///
/// ```rust
/// use std::time::Duration;
/// use summary_cache::infrastructure::hitbtc::{BackoffConfig, BackoffPolicy};
///
/// let mut policy = BackoffPolicy::new(BackoffConfig {
///     initial_delay: Duration::from_millis(100),
///     jitter_factor: 0.0,
///     max_attempts: 2,
///     ..BackoffConfig::default()
/// });
///
/// assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
/// assert_eq!(policy.next_delay(), Some(Duration::from_millis(200)));
/// assert_eq!(policy.next_delay(), None);
/// ```
#[derive(Debug)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl BackoffPolicy {
    /// Start a fresh schedule.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            current_delay,
            attempt_count: 0,
        }
    }

    /// Next delay, or `None` once `max_attempts` delays have been handed out.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }
        self.attempt_count += 1;

        let delay = self.apply_jitter(self.current_delay);

        #[allow(clippy::cast_precision_loss)]
        let scaled = (self.current_delay.as_millis() as f64 * self.config.multiplier).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            0
        };
        let capped = next_millis.min(self.config.max_delay.as_millis());
        self.current_delay = Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX));

        Some(delay)
    }

    /// Restart the schedule after a success.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Delays handed out so far.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether another delay is available.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base = duration.as_millis() as f64;
        let range = base * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-range..=range);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = (base + jitter).max(1.0) as u64;
        Duration::from_millis(millis)
    }
}
