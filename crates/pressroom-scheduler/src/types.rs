//! Schedule types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::StoreError;

/// A publishing intent: put one piece of content on one destination at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub content_id: String,
    pub campaign_id: Option<String>,
    pub destination_id: String,
    /// Earliest time the schedule may be processed.
    pub publish_at: DateTime<Utc>,
    pub status: ScheduleStatus,
    /// Failed attempts so far. Never decreases.
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub published_url: Option<String>,
    /// Backoff floor after a retryable failure.
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// Token of the worker currently holding the schedule in `Publishing`.
    pub claim_id: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Whether the schedule may be claimed by a poll at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ScheduleStatus::Pending
            && self.publish_at <= now
            && self.next_attempt_at.is_none_or(|at| at <= now)
    }

    /// Apply `update` in place. Callers check the precondition first.
    pub fn apply(&mut self, update: &ScheduleUpdate) {
        self.status = update.status;
        if let Some(attempts) = update.attempts {
            self.attempts = attempts;
        }
        if let Some(at) = update.last_attempt_at {
            self.last_attempt_at = Some(at);
        }
        if let Some(error) = &update.error {
            self.error = error.clone();
        }
        if let Some(at) = update.published_at {
            self.published_at = Some(at);
        }
        if let Some(url) = &update.published_url {
            self.published_url = Some(url.clone());
        }
        if let Some(next) = update.next_attempt_at {
            self.next_attempt_at = next;
        }
        if let Some(claim) = &update.claim {
            self.claim_id = claim.as_ref().map(|c| c.id.clone());
            self.claimed_at = claim.as_ref().map(|c| c.at);
        }
        self.updated_at = update.at;
    }
}

/// Lifecycle state of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScheduleStatus {
    /// Waiting for its publish time.
    Pending,
    /// Claimed by a worker.
    Publishing,
    Published,
    /// Out of attempts, or hit a non-retryable error.
    Failed,
    Cancelled,
}

impl ScheduleStatus {
    pub const ALL: [ScheduleStatus; 5] = [
        ScheduleStatus::Pending,
        ScheduleStatus::Publishing,
        ScheduleStatus::Published,
        ScheduleStatus::Failed,
        ScheduleStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "PENDING",
            ScheduleStatus::Publishing => "PUBLISHING",
            ScheduleStatus::Published => "PUBLISHED",
            ScheduleStatus::Failed => "FAILED",
            ScheduleStatus::Cancelled => "CANCELLED",
        }
    }

    /// Published and cancelled are final; failed only leaves via manual retry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScheduleStatus::Published | ScheduleStatus::Failed | ScheduleStatus::Cancelled
        )
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScheduleStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| StoreError::Corrupt(format!("unknown schedule status: {}", s)))
    }
}

/// Input for creating a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSchedule {
    pub content_id: String,
    #[serde(default)]
    pub campaign_id: Option<String>,
    pub destination_id: String,
    pub publish_at: DateTime<Utc>,
}

impl NewSchedule {
    pub fn at(
        content_id: impl Into<String>,
        destination_id: impl Into<String>,
        publish_at: DateTime<Utc>,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            campaign_id: None,
            destination_id: destination_id.into(),
            publish_at,
        }
    }

    /// A schedule that is due immediately.
    pub fn now(content_id: impl Into<String>, destination_id: impl Into<String>) -> Self {
        Self::at(content_id, destination_id, Utc::now())
    }

    pub fn with_campaign(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }

    /// Materialize a fresh `Pending` schedule with no attempts.
    pub fn into_schedule(self) -> Schedule {
        let now = Utc::now();
        Schedule {
            id: Uuid::new_v4().to_string(),
            content_id: self.content_id,
            campaign_id: self.campaign_id,
            destination_id: self.destination_id,
            publish_at: self.publish_at,
            status: ScheduleStatus::Pending,
            attempts: 0,
            last_attempt_at: None,
            error: None,
            published_at: None,
            published_url: None,
            next_attempt_at: None,
            claim_id: None,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Ownership token written by a successful claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub id: String,
    pub at: DateTime<Utc>,
}

/// Field changes written together with a status transition.
///
/// `None` leaves a field untouched. The nested options on nullable fields
/// distinguish "leave alone" from "clear".
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleUpdate {
    pub status: ScheduleStatus,
    pub attempts: Option<u32>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub error: Option<Option<String>>,
    pub published_at: Option<DateTime<Utc>>,
    pub published_url: Option<String>,
    pub next_attempt_at: Option<Option<DateTime<Utc>>>,
    pub claim: Option<Option<Claim>>,
    /// Becomes `updated_at`.
    pub at: DateTime<Utc>,
}

impl ScheduleUpdate {
    fn status(status: ScheduleStatus, at: DateTime<Utc>) -> Self {
        Self {
            status,
            attempts: None,
            last_attempt_at: None,
            error: None,
            published_at: None,
            published_url: None,
            next_attempt_at: None,
            claim: None,
            at,
        }
    }

    /// `Pending -> Publishing` under a fresh claim token.
    pub fn claim(claim_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            claim: Some(Some(Claim {
                id: claim_id.into(),
                at,
            })),
            ..Self::status(ScheduleStatus::Publishing, at)
        }
    }

    /// `Publishing -> Published`.
    pub fn published(url: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            last_attempt_at: Some(at),
            error: Some(None),
            published_at: Some(at),
            published_url: Some(url.into()),
            next_attempt_at: Some(None),
            claim: Some(None),
            ..Self::status(ScheduleStatus::Published, at)
        }
    }

    /// `Publishing -> Pending` after a retryable failure, gated until `next_attempt_at`.
    pub fn retry_later(
        attempts: u32,
        error: impl Into<String>,
        next_attempt_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            attempts: Some(attempts),
            last_attempt_at: Some(at),
            error: Some(Some(error.into())),
            next_attempt_at: Some(next_attempt_at),
            claim: Some(None),
            ..Self::status(ScheduleStatus::Pending, at)
        }
    }

    /// `Publishing -> Failed`.
    pub fn failed(attempts: u32, error: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            attempts: Some(attempts),
            last_attempt_at: Some(at),
            error: Some(Some(error.into())),
            next_attempt_at: Some(None),
            claim: Some(None),
            ..Self::status(ScheduleStatus::Failed, at)
        }
    }

    /// `Failed -> Pending` on manual retry. Attempts are kept.
    pub fn requeue(at: DateTime<Utc>) -> Self {
        Self {
            error: Some(None),
            next_attempt_at: Some(None),
            ..Self::status(ScheduleStatus::Pending, at)
        }
    }

    /// `Publishing -> Pending` when a claim outlives the stuck timeout.
    pub fn released(at: DateTime<Utc>) -> Self {
        Self {
            error: Some(Some("claim expired".to_string())),
            next_attempt_at: Some(None),
            claim: Some(None),
            ..Self::status(ScheduleStatus::Pending, at)
        }
    }

    /// `Publishing -> Pending` without recording an attempt.
    pub fn unclaimed(at: DateTime<Utc>) -> Self {
        Self {
            claim: Some(None),
            ..Self::status(ScheduleStatus::Pending, at)
        }
    }

    /// `Pending -> Cancelled`.
    pub fn cancelled(at: DateTime<Utc>) -> Self {
        Self {
            next_attempt_at: Some(None),
            ..Self::status(ScheduleStatus::Cancelled, at)
        }
    }
}

/// Number of schedules in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub publishing: u64,
    pub published: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub total: u64,
}

impl StatusCounts {
    /// Count one schedule (or `n`) in `status`.
    pub fn add(&mut self, status: ScheduleStatus, n: u64) {
        match status {
            ScheduleStatus::Pending => self.pending += n,
            ScheduleStatus::Publishing => self.publishing += n,
            ScheduleStatus::Published => self.published += n,
            ScheduleStatus::Failed => self.failed += n,
            ScheduleStatus::Cancelled => self.cancelled += n,
        }
        self.total += n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn pending() -> Schedule {
        NewSchedule::at("c1", "d1", Utc::now() - Duration::seconds(1)).into_schedule()
    }

    #[test]
    fn new_schedule_starts_pending() {
        let schedule = NewSchedule::now("c1", "d1").with_campaign("k1").into_schedule();
        assert_eq!(schedule.status, ScheduleStatus::Pending);
        assert_eq!(schedule.attempts, 0);
        assert_eq!(schedule.campaign_id.as_deref(), Some("k1"));
        assert!(schedule.claim_id.is_none());
    }

    #[test]
    fn due_requires_pending_and_past_publish_time() {
        let now = Utc::now();
        let mut schedule = pending();
        assert!(schedule.is_due(now));

        schedule.publish_at = now + Duration::minutes(5);
        assert!(!schedule.is_due(now));

        schedule.publish_at = now - Duration::minutes(5);
        schedule.status = ScheduleStatus::Failed;
        assert!(!schedule.is_due(now));
    }

    #[test]
    fn backoff_floor_gates_due() {
        let now = Utc::now();
        let mut schedule = pending();
        schedule.next_attempt_at = Some(now + Duration::seconds(30));
        assert!(!schedule.is_due(now));
        assert!(schedule.is_due(now + Duration::seconds(30)));
    }

    #[test]
    fn claim_then_release_keeps_attempts() {
        let now = Utc::now();
        let mut schedule = pending();
        schedule.attempts = 2;

        schedule.apply(&ScheduleUpdate::claim("tok", now));
        assert_eq!(schedule.status, ScheduleStatus::Publishing);
        assert_eq!(schedule.claim_id.as_deref(), Some("tok"));
        assert_eq!(schedule.claimed_at, Some(now));

        schedule.apply(&ScheduleUpdate::released(now));
        assert_eq!(schedule.status, ScheduleStatus::Pending);
        assert_eq!(schedule.attempts, 2);
        assert_eq!(schedule.error.as_deref(), Some("claim expired"));
        assert!(schedule.claim_id.is_none());
        assert!(schedule.claimed_at.is_none());
    }

    #[test]
    fn requeue_clears_error_but_not_attempts() {
        let now = Utc::now();
        let mut schedule = pending();
        schedule.apply(&ScheduleUpdate::claim("tok", now));
        schedule.apply(&ScheduleUpdate::failed(3, "boom", now));
        assert_eq!(schedule.status, ScheduleStatus::Failed);

        schedule.apply(&ScheduleUpdate::requeue(now));
        assert_eq!(schedule.status, ScheduleStatus::Pending);
        assert_eq!(schedule.error, None);
        assert_eq!(schedule.attempts, 3);
    }

    #[test]
    fn published_sets_url_and_time() {
        let now = Utc::now();
        let mut schedule = pending();
        schedule.apply(&ScheduleUpdate::claim("tok", now));
        schedule.apply(&ScheduleUpdate::published("https://x/1", now));
        assert_eq!(schedule.published_url.as_deref(), Some("https://x/1"));
        assert_eq!(schedule.published_at, Some(now));
        assert!(schedule.claim_id.is_none());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in ScheduleStatus::ALL {
            assert_eq!(status.as_str().parse::<ScheduleStatus>().unwrap(), status);
        }
        assert_eq!("pending".parse::<ScheduleStatus>().unwrap(), ScheduleStatus::Pending);
        assert!("DRAFT".parse::<ScheduleStatus>().is_err());
        assert_eq!(
            serde_json::to_value(ScheduleStatus::Publishing).unwrap(),
            json!("PUBLISHING")
        );
    }

    #[test]
    fn counts_accumulate_total() {
        let mut counts = StatusCounts::default();
        counts.add(ScheduleStatus::Pending, 2);
        counts.add(ScheduleStatus::Failed, 1);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.total, 3);
    }
}
