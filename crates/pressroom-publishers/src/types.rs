//! Publishing types shared by the scheduler and the adapters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PublishError;

/// A piece of content ready to be delivered to a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: String,
    /// Owner of the content; selects which webhook subscriptions are notified.
    pub user_id: String,
    pub campaign_id: Option<String>,
    pub title: String,
    /// Full body (HTML or markdown, depending on the editor).
    pub body: String,
    /// Short teaser used by character-limited platforms.
    #[serde(default)]
    pub excerpt: Option<String>,
    /// Canonical URL of the content on the CMS site.
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A configured publishing target. Read-only to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub id: String,
    /// Platform tag, resolved through the registry (e.g. "bluesky").
    pub platform: String,
    /// Credentials and per-platform settings; each adapter parses its own shape.
    pub config: Value,
    pub active: bool,
}

/// The closed set of platforms Pressroom knows how to publish to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    /// Federated social via ATProto.
    Bluesky,
    /// Federated social via the Mastodon API.
    Mastodon,
    /// Blog via the WordPress REST API.
    #[serde(rename = "wordpress")]
    WordPress,
    /// Generic custom HTTP endpoint.
    Webhook,
}

impl PlatformType {
    pub const ALL: [PlatformType; 4] = [
        PlatformType::Bluesky,
        PlatformType::Mastodon,
        PlatformType::WordPress,
        PlatformType::Webhook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::Bluesky => "bluesky",
            PlatformType::Mastodon => "mastodon",
            PlatformType::WordPress => "wordpress",
            PlatformType::Webhook => "webhook",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bluesky" | "atproto" => Ok(PlatformType::Bluesky),
            "mastodon" => Ok(PlatformType::Mastodon),
            "wordpress" => Ok(PlatformType::WordPress),
            "webhook" | "custom" => Ok(PlatformType::Webhook),
            other => Err(PublishError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// What a platform returns after a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    /// Public URL of the published item.
    pub url: String,
    /// Platform-native identifier (post id, AT URI, ...).
    pub platform_post_id: String,
}

/// Result of a read-only connectivity check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub success: bool,
    pub message: String,
    /// Free-form details for settings tooling (account name, endpoint, error kind).
    pub diagnostic: Value,
}

impl ConnectionTest {
    pub fn ok(message: impl Into<String>, diagnostic: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            diagnostic,
        }
    }

    pub fn failed(err: &PublishError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            diagnostic: serde_json::json!({ "kind": err.kind() }),
        }
    }
}
