//! Reconnection policy with exponential backoff
//!
//! A dropped connection invalidates every local book, so each reconnect is
//! followed by a full resubscription and fresh snapshots.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff settings for the feed connection
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive attempts
    pub multiplier: f64,
    /// Relative jitter in [0, 1] applied around each delay
    pub jitter: f64,
    /// Retry limit (None = unlimited)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Never reconnect; the first failure ends the feed
    pub fn disabled() -> Self {
        Self {
            max_attempts: Some(0),
            ..Self::default()
        }
    }

    /// Set initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier (values below 1.0 are treated as 1.0)
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Set jitter factor
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Set maximum attempts
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    /// Base delay for retry `attempt` (1-indexed), before jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let factor = self.multiplier.powi(exponent);
        if !factor.is_finite() {
            return self.max_delay;
        }
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }

    /// Delay for retry `attempt` with jitter applied
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter == 0.0 || base.is_zero() {
            return base;
        }
        let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        base.mul_f64(1.0 + spread)
    }

    /// Whether retry `attempt` (1-indexed) is allowed
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }

    /// Start tracking a fresh run of failures
    pub fn backoff(&self) -> Backoff {
        Backoff {
            config: self.clone(),
            attempt: 0,
        }
    }
}

/// Retry counter for one connection's failure streak
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    attempt: u32,
}

impl Backoff {
    /// Register a failure; returns the attempt number and its delay, or
    /// `None` once retries are exhausted
    pub fn next_delay(&mut self) -> Option<(u32, Duration)> {
        let attempt = self.attempt.saturating_add(1);
        if !self.config.allows(attempt) {
            return None;
        }
        self.attempt = attempt;
        Some((attempt, self.config.delay(attempt)))
    }

    /// Failures since the last successful connection
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Forget past failures after a successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
