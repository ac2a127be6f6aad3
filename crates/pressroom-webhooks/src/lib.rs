//! Webhook fan-out for Pressroom lifecycle events.
//!
//! Deliveries are best-effort and fully isolated: one endpoint failing never
//! affects another, and nothing here propagates back into schedule state.
//!
//! ## Features
//!
//! - **Dispatcher**: filters subscriptions, delivers to each independently
//! - **Retry**: bounded per-subscription attempts with a fixed delay
//! - **Signing**: `sha256=<hex>` HMAC of the raw body when a secret is set
//! - **Formatting**: flat key/value payloads for automation relays
//! - **Delivery log**: a record of every attempt for observability

mod dispatcher;
mod error;
pub mod format;
mod log;
pub mod signing;
mod source;
mod types;

pub use dispatcher::{
    DELIVERY_HEADER, DeliveryConfig, EVENT_HEADER, ResponseClass, SIGNATURE_HEADER, TIMESTAMP_HEADER,
    WebhookDispatcher, classify_response,
};
pub use error::WebhookError;
pub use format::{PayloadFormatter, RelayFormatter, StandardFormatter};
pub use log::{DeliveryLog, InMemoryDeliveryLog};
pub use signing::{sign, verify};
pub use source::{StaticSubscriptions, SubscriptionSource};
pub use types::{
    DeliveryStatus, EventData, EventMetadata, WebhookDelivery, WebhookEvent, WebhookPayload,
    WebhookSubscription,
};
