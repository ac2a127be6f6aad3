//! Where subscriptions come from at dispatch time.

use async_trait::async_trait;

use crate::{WebhookError, WebhookSubscription};

/// Read-only view of the subscriptions owned by external configuration.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    /// Every subscription (enabled or not) owned by `user_id`.
    async fn subscriptions_for(&self, user_id: &str) -> Result<Vec<WebhookSubscription>, WebhookError>;
}

/// Fixed subscription list, typically loaded once from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticSubscriptions {
    subscriptions: Vec<WebhookSubscription>,
}

impl StaticSubscriptions {
    pub fn new(subscriptions: Vec<WebhookSubscription>) -> Self {
        Self { subscriptions }
    }
}

#[async_trait]
impl SubscriptionSource for StaticSubscriptions {
    async fn subscriptions_for(&self, user_id: &str) -> Result<Vec<WebhookSubscription>, WebhookError> {
        Ok(self
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }
}
