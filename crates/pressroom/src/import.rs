//! Load contents, destinations and webhook subscriptions from a JSON file.
//!
//! The file is a single object; every list is optional:
//!
//! ```json
//! {
//!   "contents": [{ "id": "...", "userId": "...", "title": "...", "body": "..." }],
//!   "destinations": [{ "id": "...", "platform": "mastodon", "config": {}, "active": true }],
//!   "subscriptions": [{ "id": "...", "userId": "...", "url": "...", "events": ["publish.success"] }]
//! }
//! ```

use std::path::Path;

use miette::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use pressroom_publishers::{Content, Destination};
use pressroom_scheduler::SqliteStore;
use pressroom_webhooks::WebhookSubscription;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImportFile {
    pub contents: Vec<Content>,
    pub destinations: Vec<Destination>,
    pub subscriptions: Vec<WebhookSubscription>,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub contents: usize,
    pub destinations: usize,
    pub subscriptions: usize,
}

pub fn read(path: &Path) -> Result<ImportFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| miette::miette!("failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| miette::miette!("invalid import file: {}", e))
}

/// Upsert everything in `file`; existing rows with the same id are replaced.
pub fn apply(store: &SqliteStore, file: &ImportFile) -> Result<ImportSummary> {
    for content in &file.contents {
        store
            .upsert_content(content)
            .map_err(|e| miette::miette!("failed to import content {}: {}", content.id, e))?;
    }
    for destination in &file.destinations {
        store.upsert_destination(destination).map_err(|e| {
            miette::miette!("failed to import destination {}: {}", destination.id, e)
        })?;
    }
    for subscription in &file.subscriptions {
        store.upsert_subscription(subscription).map_err(|e| {
            miette::miette!("failed to import subscription {}: {}", subscription.id, e)
        })?;
    }

    let summary = ImportSummary {
        contents: file.contents.len(),
        destinations: file.destinations.len(),
        subscriptions: file.subscriptions.len(),
    };
    info!(
        contents = summary.contents,
        destinations = summary.destinations,
        subscriptions = summary.subscriptions,
        "import complete"
    );
    Ok(summary)
}
