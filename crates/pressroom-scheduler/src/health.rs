//! Health reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Schedule, ScheduleStatus, StatusCounts};

/// Snapshot served by the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// `"healthy"` while the poller runs, `"stopped"` otherwise.
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub statistics: StatusCounts,
    pub recent_activity: Vec<ActivityEntry>,
}

/// One recently touched schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    pub content_id: String,
    pub destination_id: String,
    pub status: ScheduleStatus,
    pub attempts: u32,
    pub error: Option<String>,
    pub published_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<Schedule> for ActivityEntry {
    fn from(schedule: Schedule) -> Self {
        Self {
            id: schedule.id,
            content_id: schedule.content_id,
            destination_id: schedule.destination_id,
            status: schedule.status,
            attempts: schedule.attempts,
            error: schedule.error,
            published_url: schedule.published_url,
            updated_at: schedule.updated_at,
        }
    }
}
