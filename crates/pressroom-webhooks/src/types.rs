//! Webhook types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Lifecycle events a subscription can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEvent {
    #[serde(rename = "content.created")]
    ContentCreated,
    #[serde(rename = "content.updated")]
    ContentUpdated,
    #[serde(rename = "content.deleted")]
    ContentDeleted,
    #[serde(rename = "content.published")]
    ContentPublished,
    #[serde(rename = "campaign.created")]
    CampaignCreated,
    #[serde(rename = "campaign.updated")]
    CampaignUpdated,
    #[serde(rename = "campaign.completed")]
    CampaignCompleted,
    #[serde(rename = "publish.success")]
    PublishSuccess,
    #[serde(rename = "publish.failed")]
    PublishFailed,
}

impl WebhookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::ContentCreated => "content.created",
            WebhookEvent::ContentUpdated => "content.updated",
            WebhookEvent::ContentDeleted => "content.deleted",
            WebhookEvent::ContentPublished => "content.published",
            WebhookEvent::CampaignCreated => "campaign.created",
            WebhookEvent::CampaignUpdated => "campaign.updated",
            WebhookEvent::CampaignCompleted => "campaign.completed",
            WebhookEvent::PublishSuccess => "publish.success",
            WebhookEvent::PublishFailed => "publish.failed",
        }
    }
}

impl fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_enabled() -> bool {
    true
}

/// An externally configured endpoint. Read-only at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSubscription {
    pub id: String,
    pub user_id: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub events: Vec<WebhookEvent>,
    #[serde(default)]
    pub secret: Option<String>,
    /// Total attempts per delivery, including the first.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Pause between attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl WebhookSubscription {
    /// Subscription with the default retry budget.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        url: impl Into<String>,
        events: Vec<WebhookEvent>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            url: url.into(),
            enabled: true,
            events,
            secret: None,
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_retry(mut self, retry_count: u32, retry_delay_ms: u64) -> Self {
        self.retry_count = retry_count;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    /// Whether this subscription should receive `event`.
    pub fn wants(&self, event: WebhookEvent) -> bool {
        self.enabled && self.events.contains(&event)
    }
}

/// The `data` section of a payload: the subject's id and type plus any fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EventData {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Optional context attached to every payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// The outbound wire body before endpoint-specific formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: WebhookEvent,
    pub timestamp: DateTime<Utc>,
    pub data: EventData,
    pub metadata: EventMetadata,
}

/// Lifecycle of one delivery record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// Observability record for one event delivered to one subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDelivery {
    pub id: String,
    pub webhook_id: String,
    pub event: WebhookEvent,
    /// Exact body that was sent (and signed).
    pub payload: String,
    pub status: DeliveryStatus,
    pub status_code: Option<u16>,
    /// Response body on HTTP replies, error text on transport failures.
    pub response: Option<String>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl WebhookDelivery {
    pub fn pending(subscription: &WebhookSubscription, event: WebhookEvent, payload: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            webhook_id: subscription.id.clone(),
            event,
            payload,
            status: DeliveryStatus::Pending,
            status_code: None,
            response: None,
            attempts: 0,
            created_at: Utc::now(),
            delivered_at: None,
        }
    }
}
