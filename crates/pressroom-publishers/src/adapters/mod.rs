//! Reference platform adapters.
//!
//! Each adapter parses its own credential shape out of the destination's
//! config blob. Adding a platform means a new module here plus one registry
//! entry.

mod bluesky;
mod mastodon;
mod webhook;
mod wordpress;

pub use bluesky::{BLUESKY_POST_LIMIT, BlueskyCredentials, BlueskyPublisher};
pub use mastodon::{MASTODON_STATUS_LIMIT, MastodonCredentials, MastodonPublisher};
pub use webhook::{WebhookCredentials, WebhookPublisher};
pub use wordpress::{WordPressCredentials, WordPressPublisher};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Content, PublishError};

/// Parse a credential blob, reporting shape problems as authentication errors.
pub(crate) fn parse_credentials<T: DeserializeOwned>(credentials: &Value) -> Result<T, PublishError> {
    serde_json::from_value(credentials.clone())
        .map_err(|e| PublishError::Authentication(format!("invalid credentials: {}", e)))
}

/// Strip trailing slashes so paths can be appended with `format!`.
pub(crate) fn base_url(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Compose a short-form status for character-limited social platforms.
///
/// Tries title + excerpt + link + hashtags, then drops the excerpt, then the
/// hashtags. Fails with a validation error if the title and link alone exceed
/// `limit` characters.
pub(crate) fn compose_status(content: &Content, limit: usize) -> Result<String, PublishError> {
    let hashtags = content
        .tags
        .iter()
        .map(|t| format!("#{}", t.split_whitespace().collect::<String>()))
        .collect::<Vec<_>>()
        .join(" ");

    let excerpt = content.excerpt.as_deref().filter(|e| !e.trim().is_empty());
    let link = content.canonical_url.as_deref();

    let candidates = [
        (excerpt, Some(hashtags.as_str())),
        (None, Some(hashtags.as_str())),
        (None, None),
    ];

    let mut shortest = 0;
    for (excerpt, tags) in candidates {
        let text = join_parts(&content.title, excerpt, link, tags);
        let len = text.chars().count();
        if len <= limit {
            return Ok(text);
        }
        shortest = len;
    }

    Err(PublishError::Validation(format!(
        "post is {} characters, platform limit is {}",
        shortest, limit
    )))
}

fn join_parts(title: &str, excerpt: Option<&str>, link: Option<&str>, tags: Option<&str>) -> String {
    let mut parts = vec![title.trim().to_string()];
    if let Some(excerpt) = excerpt {
        parts.push(excerpt.trim().to_string());
    }
    if let Some(link) = link {
        parts.push(link.to_string());
    }
    if let Some(tags) = tags.filter(|t| !t.is_empty()) {
        parts.push(tags.to_string());
    }
    parts.retain(|p| !p.is_empty());
    parts.join("\n\n")
}

#[cfg(test)]
pub(crate) fn sample_content() -> Content {
    Content {
        id: "content-1".to_string(),
        user_id: "user-1".to_string(),
        campaign_id: Some("campaign-1".to_string()),
        title: "Launching Pressroom".to_string(),
        body: "<p>We built a publishing scheduler.</p>".to_string(),
        excerpt: Some("A scheduler for all your channels.".to_string()),
        canonical_url: Some("https://blog.example.com/pressroom".to_string()),
        tags: vec!["rust".to_string(), "open source".to_string()],
    }
}
