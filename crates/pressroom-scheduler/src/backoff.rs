//! Retry backoff after a failed publish attempt.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff: `base * factor^(attempt - 1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub factor: u32,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(60),
            factor: 2,
            max: Duration::from_secs(3600),
        }
    }
}

impl BackoffPolicy {
    /// No floor: a failed schedule is due again on the next tick.
    pub fn none() -> Self {
        Self {
            base: Duration::ZERO,
            factor: 1,
            max: Duration::ZERO,
        }
    }

    /// Delay before the attempt that follows `attempt` failures.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let delay = self
            .factor
            .checked_pow(attempt - 1)
            .and_then(|multiplier| self.base.checked_mul(multiplier))
            .unwrap_or(self.max);
        delay.min(self.max)
    }
}

/// Default-policy delay after `attempt` failures: 1m, 2m, 4m, ... up to 1h.
pub fn backoff_delay(attempt: u32) -> Duration {
    BackoffPolicy::default().delay(attempt)
}
