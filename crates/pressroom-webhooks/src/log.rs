//! Delivery record storage.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{WebhookDelivery, WebhookError};

/// Sink for delivery records. Called on creation and after every attempt.
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    /// Insert or replace the record with `delivery.id`.
    async fn record(&self, delivery: &WebhookDelivery) -> Result<(), WebhookError>;

    /// Most recent deliveries first.
    async fn recent(&self, limit: usize) -> Result<Vec<WebhookDelivery>, WebhookError>;
}

/// Bounded in-memory ring of delivery records.
pub struct InMemoryDeliveryLog {
    capacity: usize,
    entries: Mutex<VecDeque<WebhookDelivery>>,
}

impl InMemoryDeliveryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// All records for one subscription, oldest first.
    pub async fn for_webhook(&self, webhook_id: &str) -> Vec<WebhookDelivery> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|d| d.webhook_id == webhook_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Default for InMemoryDeliveryLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl DeliveryLog for InMemoryDeliveryLog {
    async fn record(&self, delivery: &WebhookDelivery) -> Result<(), WebhookError> {
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.iter_mut().find(|d| d.id == delivery.id) {
            *existing = delivery.clone();
            return Ok(());
        }
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(delivery.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<WebhookDelivery>, WebhookError> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeliveryStatus, WebhookEvent, WebhookSubscription};

    fn delivery(webhook_id: &str) -> WebhookDelivery {
        let sub = WebhookSubscription::new(webhook_id, "u1", "https://x", vec![]);
        WebhookDelivery::pending(&sub, WebhookEvent::PublishSuccess, "{}".to_string())
    }

    #[tokio::test]
    async fn record_updates_in_place() {
        let log = InMemoryDeliveryLog::default();
        let mut d = delivery("w1");
        log.record(&d).await.unwrap();

        d.status = DeliveryStatus::Success;
        d.attempts = 1;
        log.record(&d).await.unwrap();

        assert_eq!(log.len().await, 1);
        assert_eq!(log.for_webhook("w1").await[0].status, DeliveryStatus::Success);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest() {
        let log = InMemoryDeliveryLog::new(2);
        let first = delivery("w1");
        log.record(&first).await.unwrap();
        log.record(&delivery("w2")).await.unwrap();
        log.record(&delivery("w3")).await.unwrap();

        let recent = log.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].webhook_id, "w3");
        assert!(recent.iter().all(|d| d.id != first.id));
    }
}
