//! Retry policy for transient probe failures.

use std::time::Duration;

use feedgen_shared::ProbeConfig;

/// Backoff strategy between retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed { delay: Duration },
    /// `base * factor^attempt`, capped at `max`.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
    },
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential { base, factor, max } => {
                let scale = factor.powi(attempt as i32);
                let seconds = base.as_secs_f64() * scale;
                Duration::from_secs_f64(seconds.min(max.as_secs_f64()))
            }
        }
    }
}

/// How often and how patiently a transient outcome is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

impl From<&ProbeConfig> for RetryPolicy {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Backoff::Exponential {
                base: config.backoff,
                factor: 2.0,
                max: Duration::from_secs(2).max(config.backoff),
            },
        }
    }
}
