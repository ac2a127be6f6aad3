//! Fan-out and per-endpoint delivery with bounded retry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use futures_util::future::join_all;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::format::{PayloadFormatter, RelayFormatter};
use crate::log::{DeliveryLog, InMemoryDeliveryLog};
use crate::signing::sign;
use crate::{
    DeliveryStatus, EventData, EventMetadata, WebhookDelivery, WebhookEvent, WebhookPayload,
    WebhookSubscription,
};

pub const EVENT_HEADER: &str = "X-Webhook-Event";
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";
pub const SIGNATURE_HEADER: &str = "Signature";
pub const DELIVERY_HEADER: &str = "X-Webhook-Delivery";

/// Longest response body kept on a delivery record.
const MAX_RESPONSE_CHARS: usize = 2000;

/// Transport settings for the dispatcher.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Per-attempt HTTP timeout.
    pub request_timeout: Duration,
    /// Capacity of the default in-memory delivery log.
    pub log_capacity: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            log_capacity: 1000,
        }
    }
}

/// How an HTTP status ends (or continues) the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 2xx: done.
    Success,
    /// 410: the endpoint is gone; stop immediately.
    Gone,
    /// Other 4xx and anything unexpected: stop, no retry.
    Rejected,
    /// 5xx: try again while budget remains.
    Transient,
}

pub fn classify_response(status: u16) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Success,
        410 => ResponseClass::Gone,
        400..=499 => ResponseClass::Rejected,
        500..=599 => ResponseClass::Transient,
        _ => ResponseClass::Rejected,
    }
}

/// Delivers lifecycle events to subscriber endpoints.
pub struct WebhookDispatcher {
    http: Client,
    config: DeliveryConfig,
    formatter: Arc<dyn PayloadFormatter>,
    log: Arc<dyn DeliveryLog>,
}

impl WebhookDispatcher {
    pub fn new(config: DeliveryConfig) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("pressroom-webhooks/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        let log = Arc::new(InMemoryDeliveryLog::new(config.log_capacity));

        Self {
            http,
            config,
            formatter: Arc::new(RelayFormatter::default()),
            log,
        }
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn PayloadFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_log(mut self, log: Arc<dyn DeliveryLog>) -> Self {
        self.log = log;
        self
    }

    pub fn delivery_log(&self) -> Arc<dyn DeliveryLog> {
        Arc::clone(&self.log)
    }

    /// Deliver `event` to every enabled subscriber that asked for it.
    ///
    /// Each endpoint is delivered to concurrently and independently; the
    /// returned records are for observability only.
    #[tracing::instrument(skip_all, fields(event = %event, id = %data.id))]
    pub async fn trigger(
        &self,
        event: WebhookEvent,
        data: EventData,
        metadata: EventMetadata,
        subscribers: &[WebhookSubscription],
    ) -> Vec<WebhookDelivery> {
        let targets: Vec<&WebhookSubscription> =
            subscribers.iter().filter(|s| s.wants(event)).collect();
        if targets.is_empty() {
            debug!("no subscribers for event");
            return Vec::new();
        }

        let payload = WebhookPayload {
            event,
            timestamp: Utc::now(),
            data,
            metadata,
        };

        let deliveries = join_all(targets.into_iter().map(|s| self.deliver(s, &payload))).await;

        let succeeded = deliveries
            .iter()
            .filter(|d| d.status == DeliveryStatus::Success)
            .count();
        info!(
            endpoints = deliveries.len(),
            succeeded, "webhook fan-out complete"
        );
        deliveries
    }

    /// Deliver one payload to one subscription, retrying transient failures.
    #[tracing::instrument(skip_all, fields(webhook_id = %subscription.id, url = %subscription.url))]
    pub async fn deliver(
        &self,
        subscription: &WebhookSubscription,
        payload: &WebhookPayload,
    ) -> WebhookDelivery {
        let body = self.formatter.format(&subscription.url, payload).to_string();
        let mut delivery = WebhookDelivery::pending(subscription, payload.event, body.clone());
        self.write(&delivery).await;

        let signature = match subscription.secret.as_deref().map(|s| sign(s, body.as_bytes())) {
            Some(Ok(sig)) => Some(sig),
            Some(Err(e)) => {
                warn!(error = %e, "failed to sign webhook body");
                delivery.status = DeliveryStatus::Failed;
                delivery.response = Some(e.to_string());
                self.write(&delivery).await;
                return delivery;
            }
            None => None,
        };

        let timestamp = payload
            .timestamp
            .to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let max_attempts = subscription.retry_count.max(1);
        let retry_delay = Duration::from_millis(subscription.retry_delay_ms);

        for attempt in 1..=max_attempts {
            delivery.attempts = attempt;

            let mut request = self
                .http
                .post(&subscription.url)
                .timeout(self.config.request_timeout)
                .header(CONTENT_TYPE, "application/json")
                .header(EVENT_HEADER, payload.event.as_str())
                .header(TIMESTAMP_HEADER, timestamp.as_str())
                .header(DELIVERY_HEADER, delivery.id.as_str())
                .body(body.clone());
            if let Some(sig) = &signature {
                request = request.header(SIGNATURE_HEADER, sig.as_str());
            }

            let retryable = match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let text = response.text().await.unwrap_or_default();
                    delivery.status_code = Some(status);
                    delivery.response = Some(truncate(&text, MAX_RESPONSE_CHARS));

                    match classify_response(status) {
                        ResponseClass::Success => {
                            delivery.status = DeliveryStatus::Success;
                            delivery.delivered_at = Some(Utc::now());
                            debug!(status, attempt, "webhook delivered");
                            false
                        }
                        ResponseClass::Gone => {
                            warn!(status, attempt, "webhook endpoint gone, not retrying");
                            false
                        }
                        ResponseClass::Rejected => {
                            warn!(status, attempt, "webhook rejected, not retrying");
                            false
                        }
                        ResponseClass::Transient => {
                            warn!(status, attempt, max_attempts, "webhook endpoint error");
                            true
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt, max_attempts, "webhook request failed");
                    delivery.status_code = None;
                    delivery.response = Some(e.to_string());
                    true
                }
            };

            let again = retryable && attempt < max_attempts;
            if delivery.status != DeliveryStatus::Success {
                delivery.status = if again {
                    DeliveryStatus::Pending
                } else {
                    DeliveryStatus::Failed
                };
            }
            self.write(&delivery).await;

            if !again {
                break;
            }
            sleep(retry_delay).await;
        }

        delivery
    }

    async fn write(&self, delivery: &WebhookDelivery) {
        if let Err(e) = self.log.record(delivery).await {
            warn!(delivery_id = %delivery.id, error = %e, "failed to record webhook delivery");
        }
    }
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new(DeliveryConfig::default())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_follows_status_ranges() {
        assert_eq!(classify_response(200), ResponseClass::Success);
        assert_eq!(classify_response(204), ResponseClass::Success);
        assert_eq!(classify_response(410), ResponseClass::Gone);
        assert_eq!(classify_response(400), ResponseClass::Rejected);
        assert_eq!(classify_response(429), ResponseClass::Rejected);
        assert_eq!(classify_response(500), ResponseClass::Transient);
        assert_eq!(classify_response(503), ResponseClass::Transient);
        assert_eq!(classify_response(302), ResponseClass::Rejected);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
