//! Persistence seams for the scheduler.
//!
//! The schedule store is the single source of truth. Every state change goes
//! through [`ScheduleStore::transition`], a conditional write that applies only
//! when the row is still in the expected status (and, for claimed rows, still
//! held by the expected claim). That conditional write is the only concurrency
//! control the scheduler relies on, so several processes may share one store.

mod memory;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pressroom_publishers::{Content, Destination};

use crate::{Schedule, ScheduleStatus, ScheduleUpdate, StatusCounts, StoreError};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Schedule persistence.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Insert a new schedule.
    async fn insert(&self, schedule: &Schedule) -> Result<(), StoreError>;

    /// Fetch one schedule.
    async fn get(&self, id: &str) -> Result<Option<Schedule>, StoreError>;

    /// Pending schedules due at `now`, oldest `publish_at` first.
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, StoreError>;

    /// Apply `update` iff the schedule is in `from` and, when `claim_id` is
    /// given, still holds that claim. Returns whether the write applied.
    async fn transition(
        &self,
        id: &str,
        from: ScheduleStatus,
        claim_id: Option<&str>,
        update: &ScheduleUpdate,
    ) -> Result<bool, StoreError>;

    /// Publishing schedules claimed before `claimed_before`.
    async fn find_stuck(&self, claimed_before: DateTime<Utc>) -> Result<Vec<Schedule>, StoreError>;

    /// Schedule count per status.
    async fn status_counts(&self) -> Result<StatusCounts, StoreError>;

    /// Most recently updated schedules first.
    async fn recent(&self, limit: usize) -> Result<Vec<Schedule>, StoreError>;
}

/// Read-only access to content and destinations owned by the rest of the CMS.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn content(&self, id: &str) -> Result<Option<Content>, StoreError>;

    async fn destination(&self, id: &str) -> Result<Option<Destination>, StoreError>;
}
