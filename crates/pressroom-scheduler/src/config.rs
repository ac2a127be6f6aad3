//! Scheduler configuration.

use std::time::Duration;

use crate::BackoffPolicy;

/// Knobs for the poller and the dispatch coordinator.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between automatic ticks.
    pub poll_interval: Duration,
    /// Failed attempts after which a schedule becomes `Failed`.
    pub max_attempts: u32,
    /// Due schedules processed at once within a tick.
    pub concurrency: usize,
    /// Floor between a retryable failure and the next attempt, counted from
    /// the claim. Off by default, so each tick retries; a floor of one poll
    /// interval or more skips at least one tick per retry.
    pub backoff: BackoffPolicy,
    /// Claims older than this are returned to `Pending` by the recovery sweep.
    pub stuck_timeout: Duration,
    /// Schedules listed under `recentActivity` in health reports.
    pub recent_activity_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            max_attempts: 3,
            concurrency: 4,
            backoff: BackoffPolicy::none(),
            stuck_timeout: Duration::from_secs(15 * 60),
            recent_activity_limit: 10,
        }
    }
}

impl SchedulerConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_stuck_timeout(mut self, stuck_timeout: Duration) -> Self {
        self.stuck_timeout = stuck_timeout;
        self
    }

    pub fn with_recent_activity_limit(mut self, limit: usize) -> Self {
        self.recent_activity_limit = limit;
        self
    }
}
