//! Error types for webhook delivery.

use thiserror::Error;

/// Errors confined to the webhook subsystem.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HMAC key could not be initialised.
    #[error("signing error: {0}")]
    Signing(String),

    /// Endpoint answered with a non-success status.
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Subscription lookup failed.
    #[error("subscription source error: {0}")]
    Source(String),

    /// Delivery record could not be written.
    #[error("delivery log error: {0}")]
    Log(String),
}
