//! Error types for publishing.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while authenticating against or publishing to a platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Bad or expired credentials. Needs user correction.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The platform rejected the payload (length limit, missing field).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Network failure, 5xx, or rate limit. Worth another attempt.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Any other rejection that will not succeed on retry.
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// No adapter is registered for the destination's platform tag.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl PublishError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PublishError::Transient(_))
    }

    /// Short machine-readable name for logs and webhook payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::Authentication(_) => "authentication",
            PublishError::Validation(_) => "validation",
            PublishError::Transient(_) => "transient",
            PublishError::Permanent(_) => "permanent",
            PublishError::UnsupportedPlatform(_) => "unsupported_platform",
        }
    }

    /// Classify a non-success HTTP response from a platform API.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = if body.is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, truncate(body, 500))
        };

        match status.as_u16() {
            401 | 403 => PublishError::Authentication(detail),
            400 | 413 | 422 => PublishError::Validation(detail),
            408 | 429 => PublishError::Transient(detail),
            s if s >= 500 => PublishError::Transient(detail),
            _ => PublishError::Permanent(detail),
        }
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PublishError::Permanent(format!("unexpected response body: {}", err))
        } else if let Some(status) = err.status() {
            PublishError::from_status(status, "")
        } else {
            PublishError::Transient(err.to_string())
        }
    }
}

/// Turn a non-2xx response into a classified error, passing successes through.
pub(crate) async fn check_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PublishError::from_status(status, &body))
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
