//! Registry mapping platform tags to adapter factories.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::adapters::{BlueskyPublisher, MastodonPublisher, WebhookPublisher, WordPressPublisher};
use crate::{PlatformType, PublishError, Publisher};

/// Builds a fresh adapter for one publish attempt.
pub type PublisherFactory = Arc<dyn Fn() -> Box<dyn Publisher> + Send + Sync>;

/// Static map from platform type to adapter factory, built once at startup.
#[derive(Clone, Default)]
pub struct PublisherRegistry {
    factories: HashMap<PlatformType, PublisherFactory>,
}

impl PublisherRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in adapter sharing one HTTP client.
    pub fn with_defaults(http: Client) -> Self {
        let mut registry = Self::new();

        let client = http.clone();
        registry.register(PlatformType::Bluesky, move || {
            Box::new(BlueskyPublisher::new(client.clone()))
        });

        let client = http.clone();
        registry.register(PlatformType::Mastodon, move || {
            Box::new(MastodonPublisher::new(client.clone()))
        });

        let client = http.clone();
        registry.register(PlatformType::WordPress, move || {
            Box::new(WordPressPublisher::new(client.clone()))
        });

        registry.register(PlatformType::Webhook, move || {
            Box::new(WebhookPublisher::new(http.clone()))
        });

        registry
    }

    /// Register (or replace) the factory for a platform.
    pub fn register<F>(&mut self, platform: PlatformType, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Publisher> + Send + Sync + 'static,
    {
        self.factories.insert(platform, Arc::new(factory));
        self
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with<F>(mut self, platform: PlatformType, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Publisher> + Send + Sync + 'static,
    {
        self.register(platform, factory);
        self
    }

    /// Resolve a new adapter for a destination's platform tag.
    pub fn resolve(&self, tag: &str) -> Result<Box<dyn Publisher>, PublishError> {
        let platform: PlatformType = tag.parse()?;
        let factory = self
            .factories
            .get(&platform)
            .ok_or_else(|| PublishError::UnsupportedPlatform(platform.to_string()))?;
        debug!(%platform, "resolved publisher");
        Ok(factory())
    }

    /// Platforms with a registered adapter.
    pub fn platforms(&self) -> Vec<PlatformType> {
        PlatformType::ALL
            .into_iter()
            .filter(|p| self.factories.contains_key(p))
            .collect()
    }
}

/// HTTP client with the timeouts used for platform calls.
pub fn default_http_client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("pressroom/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}
