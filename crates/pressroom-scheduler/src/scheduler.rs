//! The polling loop that feeds due schedules to the coordinator.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::health::{ActivityEntry, HealthReport};
use crate::{
    Coordinator, NewSchedule, ProcessOutcome, Schedule, SchedulerConfig, SchedulerError,
};

/// Whether the loop is running, and how often it ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub is_running: bool,
    #[serde(rename = "pollIntervalMs", with = "duration_millis")]
    pub poll_interval: Duration,
}

/// Summary of one poll pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    /// Another pass was already running, so this one did nothing.
    pub skipped: bool,
    /// Stuck claims returned to pending by the sweep.
    pub recovered: usize,
    pub due: usize,
    pub published: usize,
    pub retrying: usize,
    pub failed: usize,
    /// Lost the claim race to another worker.
    pub not_claimed: usize,
    pub errors: usize,
}

impl TickReport {
    fn count(&mut self, outcome: &Result<ProcessOutcome, SchedulerError>) {
        match outcome {
            Ok(ProcessOutcome::Published { .. }) => self.published += 1,
            Ok(ProcessOutcome::Retrying { .. }) => self.retrying += 1,
            Ok(ProcessOutcome::Failed { .. }) => self.failed += 1,
            Ok(ProcessOutcome::NotClaimed | ProcessOutcome::ClaimLost) => self.not_claimed += 1,
            Err(_) => self.errors += 1,
        }
    }
}

struct Runner {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// An explicit, stoppable poller. Cheap to clone; clones share the loop.
#[derive(Clone)]
pub struct Scheduler {
    coordinator: Arc<Coordinator>,
    config: SchedulerConfig,
    /// Held for the duration of a pass; prevents overlapping polls.
    tick_lock: Arc<Mutex<()>>,
    runner: Arc<Mutex<Option<Runner>>>,
}

impl Scheduler {
    /// Create a stopped scheduler using the coordinator's configuration.
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        let config = coordinator.config().clone();
        Self {
            coordinator,
            config,
            tick_lock: Arc::new(Mutex::new(())),
            runner: Arc::new(Mutex::new(None)),
        }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Begin ticking every `poll_interval`, starting immediately.
    ///
    /// Returns `false` if the loop was already running.
    pub async fn start(&self) -> bool {
        let mut runner = self.runner.lock().await;
        if runner.is_some() {
            debug!("scheduler already running");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let this = self.clone();
        let handle = tokio::spawn(async move { this.run(shutdown_rx).await });
        *runner = Some(Runner {
            shutdown_tx,
            handle,
        });

        info!(
            poll_interval_secs = self.config.poll_interval.as_secs_f64(),
            max_attempts = self.config.max_attempts,
            "scheduler started"
        );
        true
    }

    /// Stop ticking and wait for any in-flight pass to finish.
    ///
    /// Returns `false` if the loop was not running.
    pub async fn stop(&self) -> bool {
        let Some(runner) = self.runner.lock().await.take() else {
            debug!("scheduler not running");
            return false;
        };

        let _ = runner.shutdown_tx.send(true);
        if let Err(e) = runner.handle.await {
            error!(error = %e, "scheduler loop panicked");
        }

        // A manual trigger may still be mid-pass.
        let _pass = self.tick_lock.lock().await;

        info!("scheduler stopped");
        true
    }

    pub async fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            is_running: self.runner.lock().await.is_some(),
            poll_interval: self.config.poll_interval,
        }
    }

    /// Run one pass now, independent of the timer.
    pub async fn trigger_now(&self) -> Result<TickReport, SchedulerError> {
        info!("manual poll triggered");
        self.tick().await
    }

    /// One pass: recover stuck claims, then process everything due.
    ///
    /// Due schedules are fetched oldest first and processed with bounded
    /// concurrency. A pass that finds another pass running does nothing.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> Result<TickReport, SchedulerError> {
        let Ok(_pass) = self.tick_lock.try_lock() else {
            debug!("previous poll still running, skipping");
            return Ok(TickReport {
                skipped: true,
                ..TickReport::default()
            });
        };

        let mut report = TickReport {
            recovered: self
                .coordinator
                .recover_stuck(self.config.stuck_timeout)
                .await?,
            ..TickReport::default()
        };

        let due = self.coordinator.store().find_due(Utc::now()).await?;
        report.due = due.len();
        if due.is_empty() {
            debug!("no due schedules");
            return Ok(report);
        }

        let coordinator = &self.coordinator;
        let outcomes: Vec<_> = stream::iter(due)
            .map(|schedule| async move {
                let outcome = coordinator.process_one(&schedule.id).await;
                (schedule.id, outcome)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for (schedule_id, outcome) in &outcomes {
            if let Err(e) = outcome {
                error!(%schedule_id, error = %e, "failed to process schedule");
            }
            report.count(outcome);
        }

        info!(
            due = report.due,
            published = report.published,
            retrying = report.retrying,
            failed = report.failed,
            recovered = report.recovered,
            "poll complete"
        );
        Ok(report)
    }

    /// Queue a new pending schedule.
    #[tracing::instrument(skip(self, new), fields(content_id = %new.content_id, destination_id = %new.destination_id))]
    pub async fn enqueue(&self, new: NewSchedule) -> Result<Schedule, SchedulerError> {
        let schedule = new.into_schedule();
        self.coordinator.store().insert(&schedule).await?;
        info!(schedule_id = %schedule.id, publish_at = %schedule.publish_at, "schedule queued");
        Ok(schedule)
    }

    /// Status counts plus the most recently touched schedules.
    pub async fn health(&self) -> Result<HealthReport, SchedulerError> {
        let store = self.coordinator.store();
        let statistics = store.status_counts().await?;
        let recent = store.recent(self.config.recent_activity_limit).await?;
        let is_running = self.status().await.is_running;

        Ok(HealthReport {
            status: if is_running { "healthy" } else { "stopped" }.to_string(),
            timestamp: Utc::now(),
            statistics,
            recent_activity: recent.into_iter().map(ActivityEntry::from).collect(),
        })
    }

    async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("scheduler received shutdown signal");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    // Runs in the handler, so a shutdown signal never interrupts a pass.
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "poll failed");
                    }
                }
            }
        }

        info!("scheduler loop exited");
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }
}
