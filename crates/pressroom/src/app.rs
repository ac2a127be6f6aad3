//! Wiring shared by every subcommand: database, registry, webhooks, scheduler.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use miette::Result;

use pressroom_publishers::{PublisherRegistry, default_http_client};
use pressroom_scheduler::{BackoffPolicy, Coordinator, Scheduler, SchedulerConfig, SqliteStore};
use pressroom_webhooks::{DeliveryConfig, WebhookDispatcher};

/// Scheduler tuning, shared by `serve` and the one-shot commands.
#[derive(Debug, Clone, Args)]
pub struct SchedulerArgs {
    /// Poll interval in seconds
    #[arg(long, global = true, env = "PRESSROOM_POLL_INTERVAL", default_value = "60")]
    pub poll_interval: u64,

    /// Attempts before a schedule is marked failed
    #[arg(long, global = true, env = "PRESSROOM_MAX_ATTEMPTS", default_value = "3")]
    pub max_attempts: u32,

    /// Schedules processed concurrently within one poll
    #[arg(long, global = true, env = "PRESSROOM_CONCURRENCY", default_value = "4")]
    pub concurrency: usize,

    /// Backoff after the first failure, in seconds (0, the default, retries on the next poll)
    #[arg(long, global = true, env = "PRESSROOM_BACKOFF_BASE", default_value = "0")]
    pub backoff_base: u64,

    /// Longest backoff, in seconds
    #[arg(long, global = true, env = "PRESSROOM_BACKOFF_MAX", default_value = "3600")]
    pub backoff_max: u64,

    /// Seconds a claim may be held before the sweep returns it to pending
    #[arg(long, global = true, env = "PRESSROOM_STUCK_TIMEOUT", default_value = "900")]
    pub stuck_timeout: u64,

    /// Per-request webhook timeout in seconds
    #[arg(long, global = true, env = "PRESSROOM_WEBHOOK_TIMEOUT", default_value = "10")]
    pub webhook_timeout: u64,
}

impl SchedulerArgs {
    pub fn config(&self) -> SchedulerConfig {
        let backoff = if self.backoff_base == 0 {
            BackoffPolicy::none()
        } else {
            BackoffPolicy {
                base: Duration::from_secs(self.backoff_base),
                max: Duration::from_secs(self.backoff_max.max(self.backoff_base)),
                ..BackoffPolicy::default()
            }
        };

        SchedulerConfig::default()
            .with_poll_interval(Duration::from_secs(self.poll_interval.max(1)))
            .with_max_attempts(self.max_attempts)
            .with_concurrency(self.concurrency)
            .with_backoff(backoff)
            .with_stuck_timeout(Duration::from_secs(self.stuck_timeout))
    }

    fn delivery(&self) -> DeliveryConfig {
        DeliveryConfig {
            request_timeout: Duration::from_secs(self.webhook_timeout.max(1)),
            ..DeliveryConfig::default()
        }
    }
}

pub fn open_store(db: &Path) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(db)
        .map_err(|e| miette::miette!("failed to open database {}: {}", db.display(), e))?;
    Ok(Arc::new(store))
}

/// A stopped scheduler backed by one SQLite file, with every built-in
/// adapter registered and webhook deliveries logged to the same database.
pub fn build_scheduler(store: Arc<SqliteStore>, args: &SchedulerArgs) -> Scheduler {
    let registry = PublisherRegistry::with_defaults(default_http_client());
    let webhooks = WebhookDispatcher::new(args.delivery()).with_log(store.clone());

    let coordinator = Coordinator::new(store.clone(), store.clone(), registry)
        .with_webhooks(Arc::new(webhooks), store)
        .with_config(args.config());

    Scheduler::new(Arc::new(coordinator))
}
