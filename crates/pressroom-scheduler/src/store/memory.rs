//! In-process store for tests and single-process embedding.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use pressroom_publishers::{Content, Destination};

use super::{Catalog, ScheduleStore};
use crate::{Schedule, ScheduleStatus, ScheduleUpdate, StatusCounts, StoreError};

/// Schedules, content and destinations held in memory.
#[derive(Default)]
pub struct MemoryStore {
    schedules: RwLock<HashMap<String, Schedule>>,
    contents: RwLock<HashMap<String, Content>>,
    destinations: RwLock<HashMap<String, Destination>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_content(&self, content: Content) {
        self.contents
            .write()
            .await
            .insert(content.id.clone(), content);
    }

    pub async fn put_destination(&self, destination: Destination) {
        self.destinations
            .write()
            .await
            .insert(destination.id.clone(), destination);
    }

    /// Overwrite a schedule unconditionally. Test setup only; the scheduler
    /// itself always goes through [`ScheduleStore::transition`].
    pub async fn put_schedule(&self, schedule: Schedule) {
        self.schedules
            .write()
            .await
            .insert(schedule.id.clone(), schedule);
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn insert(&self, schedule: &Schedule) -> Result<(), StoreError> {
        let mut schedules = self.schedules.write().await;
        if schedules.contains_key(&schedule.id) {
            return Err(StoreError::Corrupt(format!(
                "duplicate schedule id: {}",
                schedule.id
            )));
        }
        schedules.insert(schedule.id.clone(), schedule.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Schedule>, StoreError> {
        Ok(self.schedules.read().await.get(id).cloned())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, StoreError> {
        let mut due: Vec<Schedule> = self
            .schedules
            .read()
            .await
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.publish_at.cmp(&b.publish_at).then_with(|| a.id.cmp(&b.id)));
        Ok(due)
    }

    async fn transition(
        &self,
        id: &str,
        from: ScheduleStatus,
        claim_id: Option<&str>,
        update: &ScheduleUpdate,
    ) -> Result<bool, StoreError> {
        let mut schedules = self.schedules.write().await;
        let Some(schedule) = schedules.get_mut(id) else {
            return Ok(false);
        };
        if schedule.status != from {
            return Ok(false);
        }
        if let Some(expected) = claim_id
            && schedule.claim_id.as_deref() != Some(expected)
        {
            return Ok(false);
        }
        schedule.apply(update);
        Ok(true)
    }

    async fn find_stuck(&self, claimed_before: DateTime<Utc>) -> Result<Vec<Schedule>, StoreError> {
        Ok(self
            .schedules
            .read()
            .await
            .values()
            .filter(|s| {
                s.status == ScheduleStatus::Publishing
                    && s.claimed_at.is_none_or(|at| at < claimed_before)
            })
            .cloned()
            .collect())
    }

    async fn status_counts(&self) -> Result<StatusCounts, StoreError> {
        let mut counts = StatusCounts::default();
        for schedule in self.schedules.read().await.values() {
            counts.add(schedule.status, 1);
        }
        Ok(counts)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Schedule>, StoreError> {
        let mut all: Vec<Schedule> = self.schedules.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        all.truncate(limit);
        Ok(all)
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn content(&self, id: &str) -> Result<Option<Content>, StoreError> {
        Ok(self.contents.read().await.get(id).cloned())
    }

    async fn destination(&self, id: &str) -> Result<Option<Destination>, StoreError> {
        Ok(self.destinations.read().await.get(id).cloned())
    }
}
