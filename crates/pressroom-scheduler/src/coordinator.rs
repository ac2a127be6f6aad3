//! Per-schedule attempt lifecycle: claim, publish, record, notify.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use pressroom_publishers::{Content, Destination, PublishError, PublishReceipt, PublisherRegistry};
use pressroom_webhooks::{
    EventData, EventMetadata, StaticSubscriptions, SubscriptionSource, WebhookDispatcher,
    WebhookEvent,
};

use crate::store::{Catalog, ScheduleStore};
use crate::{Schedule, ScheduleStatus, ScheduleUpdate, SchedulerConfig, SchedulerError};

/// Result of one `process_one` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ProcessOutcome {
    /// The schedule was not pending, or another worker claimed it first.
    NotClaimed,
    #[serde(rename_all = "camelCase")]
    Published { url: String, platform_post_id: String },
    /// Failed but back to `Pending` for a later tick.
    #[serde(rename_all = "camelCase")]
    Retrying {
        attempts: u32,
        error: String,
        next_attempt_at: Option<DateTime<Utc>>,
    },
    #[serde(rename_all = "camelCase")]
    Failed { attempts: u32, error: String },
    /// The claim was recovered by the sweep while the attempt ran; nothing was written.
    ClaimLost,
}

/// What one claimed attempt produced, before it is written back.
struct Attempt {
    content: Option<Content>,
    destination: Option<Destination>,
    result: Result<PublishReceipt, PublishError>,
}

/// Owns the attempt lifecycle of individual schedules.
pub struct Coordinator {
    store: Arc<dyn ScheduleStore>,
    catalog: Arc<dyn Catalog>,
    registry: PublisherRegistry,
    webhooks: Arc<WebhookDispatcher>,
    subscriptions: Arc<dyn SubscriptionSource>,
    config: SchedulerConfig,
}

impl Coordinator {
    /// Create a coordinator with no webhook subscribers.
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        catalog: Arc<dyn Catalog>,
        registry: PublisherRegistry,
    ) -> Self {
        Self {
            store,
            catalog,
            registry,
            webhooks: Arc::new(WebhookDispatcher::default()),
            subscriptions: Arc::new(StaticSubscriptions::default()),
            config: SchedulerConfig::default(),
        }
    }

    pub fn with_webhooks(
        mut self,
        webhooks: Arc<WebhookDispatcher>,
        subscriptions: Arc<dyn SubscriptionSource>,
    ) -> Self {
        self.webhooks = webhooks;
        self.subscriptions = subscriptions;
        self
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ScheduleStore> {
        &self.store
    }

    /// Claim and attempt one schedule.
    ///
    /// Publish failures are absorbed into schedule state; only store errors
    /// are returned.
    #[tracing::instrument(skip(self), fields(claim_id = tracing::field::Empty))]
    pub async fn process_one(&self, schedule_id: &str) -> Result<ProcessOutcome, SchedulerError> {
        let claim_id = Uuid::new_v4().to_string();
        let claimed_at = Utc::now();
        let claimed = self
            .store
            .transition(
                schedule_id,
                ScheduleStatus::Pending,
                None,
                &ScheduleUpdate::claim(&claim_id, claimed_at),
            )
            .await?;
        if !claimed {
            debug!(schedule_id, "schedule not claimable, skipping");
            return Ok(ProcessOutcome::NotClaimed);
        }
        tracing::Span::current().record("claim_id", claim_id.as_str());

        let schedule = match self.store.get(schedule_id).await {
            Ok(Some(schedule)) => schedule,
            loaded => {
                self.unclaim(schedule_id, &claim_id).await;
                return Err(match loaded {
                    Err(e) => e.into(),
                    _ => SchedulerError::NotFound(schedule_id.to_string()),
                });
            }
        };

        let attempt = self.attempt(&schedule).await;
        let now = Utc::now();

        match attempt.result {
            Ok(receipt) => {
                let applied = self
                    .store
                    .transition(
                        schedule_id,
                        ScheduleStatus::Publishing,
                        Some(claim_id.as_str()),
                        &ScheduleUpdate::published(&receipt.url, now),
                    )
                    .await?;
                if !applied {
                    warn!(schedule_id, "claim lost before success could be recorded");
                    return Ok(ProcessOutcome::ClaimLost);
                }

                info!(schedule_id, url = %receipt.url, "schedule published");
                let data = EventData::new(&schedule.id, "schedule")
                    .field("contentId", schedule.content_id.as_str())
                    .field("destinationId", schedule.destination_id.as_str())
                    .field("publishedUrl", receipt.url.as_str())
                    .field("platformPostId", receipt.platform_post_id.as_str())
                    .field("publishedAt", now.to_rfc3339());
                self.emit(
                    WebhookEvent::PublishSuccess,
                    &schedule,
                    attempt.content.as_ref(),
                    attempt.destination.as_ref(),
                    data,
                )
                .await;

                Ok(ProcessOutcome::Published {
                    url: receipt.url,
                    platform_post_id: receipt.platform_post_id,
                })
            }
            Err(err) => {
                let attempts = schedule.attempts.saturating_add(1);
                let message = err.to_string();
                let exhausted = attempts >= self.config.max_attempts;
                let terminal = exhausted || !err.is_retryable();

                if !terminal {
                    // Measured from the claim, not from when the publish call returned.
                    let delay = self.config.backoff.delay(attempts);
                    let next_attempt_at = (!delay.is_zero()).then(|| after(claimed_at, delay));
                    let applied = self
                        .store
                        .transition(
                            schedule_id,
                            ScheduleStatus::Publishing,
                            Some(claim_id.as_str()),
                            &ScheduleUpdate::retry_later(attempts, &message, next_attempt_at, now),
                        )
                        .await?;
                    if !applied {
                        warn!(schedule_id, "claim lost before failure could be recorded");
                        return Ok(ProcessOutcome::ClaimLost);
                    }

                    warn!(
                        schedule_id,
                        attempts,
                        max_attempts = self.config.max_attempts,
                        kind = err.kind(),
                        error = %message,
                        "publish attempt failed, will retry"
                    );
                    return Ok(ProcessOutcome::Retrying {
                        attempts,
                        error: message,
                        next_attempt_at,
                    });
                }

                let applied = self
                    .store
                    .transition(
                        schedule_id,
                        ScheduleStatus::Publishing,
                        Some(claim_id.as_str()),
                        &ScheduleUpdate::failed(attempts, &message, now),
                    )
                    .await?;
                if !applied {
                    warn!(schedule_id, "claim lost before failure could be recorded");
                    return Ok(ProcessOutcome::ClaimLost);
                }

                error!(
                    schedule_id,
                    attempts,
                    kind = err.kind(),
                    error = %message,
                    "schedule failed"
                );
                let data = EventData::new(&schedule.id, "schedule")
                    .field("contentId", schedule.content_id.as_str())
                    .field("destinationId", schedule.destination_id.as_str())
                    .field("error", message.as_str())
                    .field("errorKind", err.kind())
                    .field("attempts", attempts);
                self.emit(
                    WebhookEvent::PublishFailed,
                    &schedule,
                    attempt.content.as_ref(),
                    attempt.destination.as_ref(),
                    data,
                )
                .await;

                Ok(ProcessOutcome::Failed {
                    attempts,
                    error: message,
                })
            }
        }
    }

    /// Hand a claimed schedule back untouched. Best effort; the sweep covers failures.
    async fn unclaim(&self, schedule_id: &str, claim_id: &str) {
        let released = self
            .store
            .transition(
                schedule_id,
                ScheduleStatus::Publishing,
                Some(claim_id),
                &ScheduleUpdate::unclaimed(Utc::now()),
            )
            .await;
        if let Err(e) = released {
            error!(schedule_id, error = %e, "failed to release claim");
        }
    }

    /// Load inputs, resolve the adapter, authenticate, and publish.
    async fn attempt(&self, schedule: &Schedule) -> Attempt {
        let content = match self.catalog.content(&schedule.content_id).await {
            Ok(content) => content,
            Err(e) => {
                return Attempt {
                    content: None,
                    destination: None,
                    result: Err(PublishError::Transient(format!("catalog unavailable: {}", e))),
                };
            }
        };
        let destination = match self.catalog.destination(&schedule.destination_id).await {
            Ok(destination) => destination,
            Err(e) => {
                return Attempt {
                    content,
                    destination: None,
                    result: Err(PublishError::Transient(format!("catalog unavailable: {}", e))),
                };
            }
        };

        let result = match (&content, &destination) {
            (None, _) => Err(PublishError::Permanent(format!(
                "content not found: {}",
                schedule.content_id
            ))),
            (_, None) => Err(PublishError::Permanent(format!(
                "destination not found: {}",
                schedule.destination_id
            ))),
            (Some(_), Some(d)) if !d.active => Err(PublishError::Permanent(format!(
                "destination is inactive: {}",
                d.id
            ))),
            (Some(content), Some(destination)) => self.publish(content, destination).await,
        };

        Attempt {
            content,
            destination,
            result,
        }
    }

    async fn publish(
        &self,
        content: &Content,
        destination: &Destination,
    ) -> Result<PublishReceipt, PublishError> {
        let mut publisher = self.registry.resolve(&destination.platform)?;
        publisher.authenticate(&destination.config).await?;
        debug!(platform = %publisher.platform(), destination_id = %destination.id, "authenticated");
        publisher.publish(content).await
    }

    /// Fan a lifecycle event out to the content owner's subscriptions.
    async fn emit(
        &self,
        event: WebhookEvent,
        schedule: &Schedule,
        content: Option<&Content>,
        destination: Option<&Destination>,
        data: EventData,
    ) {
        let Some(content) = content else {
            debug!(schedule_id = %schedule.id, %event, "no content owner, skipping webhooks");
            return;
        };

        let subscribers = match self.subscriptions.subscriptions_for(&content.user_id).await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                warn!(schedule_id = %schedule.id, error = %e, "failed to load webhook subscriptions");
                return;
            }
        };

        let metadata = EventMetadata {
            user_id: Some(content.user_id.clone()),
            campaign_id: schedule
                .campaign_id
                .clone()
                .or_else(|| content.campaign_id.clone()),
            platform: destination.map(|d| d.platform.clone()),
            scheduled_for: Some(schedule.publish_at),
        };
        self.webhooks
            .trigger(event, data, metadata, &subscribers)
            .await;
    }

    /// Manually return a failed schedule to `Pending`.
    ///
    /// Attempts are preserved, so with the default budget a retried schedule
    /// gets exactly one more automatic attempt.
    #[tracing::instrument(skip(self))]
    pub async fn retry(&self, schedule_id: &str) -> Result<Schedule, SchedulerError> {
        self.manual_transition(
            schedule_id,
            ScheduleStatus::Failed,
            "retry",
            ScheduleUpdate::requeue(Utc::now()),
        )
        .await
    }

    /// Cancel a schedule that has not been picked up yet.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, schedule_id: &str) -> Result<Schedule, SchedulerError> {
        self.manual_transition(
            schedule_id,
            ScheduleStatus::Pending,
            "cancel",
            ScheduleUpdate::cancelled(Utc::now()),
        )
        .await
    }

    /// Process a pending schedule immediately, ignoring `publish_at` and any backoff floor.
    #[tracing::instrument(skip(self))]
    pub async fn publish_now(&self, schedule_id: &str) -> Result<ProcessOutcome, SchedulerError> {
        let schedule = self
            .store
            .get(schedule_id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(schedule_id.to_string()))?;
        if schedule.status != ScheduleStatus::Pending {
            return Err(SchedulerError::InvalidTransition {
                id: schedule.id,
                from: schedule.status,
                action: "publish",
            });
        }
        self.process_one(schedule_id).await
    }

    /// Return schedules whose claim is older than `timeout` to `Pending`.
    ///
    /// Attempts are left alone; the interrupted attempt is not counted.
    #[tracing::instrument(skip(self))]
    pub async fn recover_stuck(&self, timeout: Duration) -> Result<usize, SchedulerError> {
        let now = Utc::now();
        let cutoff = before(now, timeout);
        let stuck = self.store.find_stuck(cutoff).await?;

        let mut recovered = 0;
        for schedule in stuck {
            let applied = self
                .store
                .transition(
                    &schedule.id,
                    ScheduleStatus::Publishing,
                    schedule.claim_id.as_deref(),
                    &ScheduleUpdate::released(now),
                )
                .await?;
            if applied {
                warn!(
                    schedule_id = %schedule.id,
                    claimed_at = ?schedule.claimed_at,
                    "recovered schedule stuck in publishing"
                );
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    async fn manual_transition(
        &self,
        schedule_id: &str,
        from: ScheduleStatus,
        action: &'static str,
        update: ScheduleUpdate,
    ) -> Result<Schedule, SchedulerError> {
        let schedule = self
            .store
            .get(schedule_id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(schedule_id.to_string()))?;

        let applied = schedule.status == from
            && self.store.transition(schedule_id, from, None, &update).await?;
        if !applied {
            // Re-read so the error names the status that actually blocked us.
            let current = self
                .store
                .get(schedule_id)
                .await?
                .map(|s| s.status)
                .unwrap_or(schedule.status);
            return Err(SchedulerError::InvalidTransition {
                id: schedule_id.to_string(),
                from: current,
                action,
            });
        }

        info!(schedule_id, action, "schedule updated");
        self.store
            .get(schedule_id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(schedule_id.to_string()))
    }
}

fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn before(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
