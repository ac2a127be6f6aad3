//! Shared fixtures for scheduler integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::Notify;

use pressroom_publishers::{
    ConnectionTest, Content, Destination, PlatformType, PublishError, PublishReceipt, Publisher,
    PublisherRegistry,
};
use pressroom_scheduler::{
    BackoffPolicy, Coordinator, MemoryStore, NewSchedule, Schedule, ScheduleStore, Scheduler,
    SchedulerConfig,
};
use pressroom_webhooks::{
    DeliveryConfig, InMemoryDeliveryLog, StaticSubscriptions, WebhookDispatcher,
    WebhookSubscription,
};

pub const USER_ID: &str = "user-1";
pub const CONTENT_ID: &str = "content-1";
pub const DESTINATION_ID: &str = "dest-1";

/// What the stub publisher does on its next call.
#[derive(Clone)]
pub enum Behavior {
    Succeed,
    Fail(PublishError),
    /// Wait for a notification, then succeed.
    Block(Arc<Notify>),
    /// Take a while, then fail.
    SlowFail(Duration, PublishError),
}

/// Controls and observes every stub adapter the registry hands out.
#[derive(Clone)]
pub struct Stub {
    behavior: Arc<Mutex<Behavior>>,
    calls: Arc<AtomicUsize>,
}

impl Stub {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Registry whose webhook-platform adapter is this stub.
    pub fn registry(&self) -> PublisherRegistry {
        let stub = self.clone();
        PublisherRegistry::new().with(PlatformType::Webhook, move || {
            Box::new(StubPublisher { stub: stub.clone() })
        })
    }
}

struct StubPublisher {
    stub: Stub,
}

#[async_trait]
impl Publisher for StubPublisher {
    fn platform(&self) -> PlatformType {
        PlatformType::Webhook
    }

    async fn authenticate(&mut self, _credentials: &Value) -> Result<(), PublishError> {
        Ok(())
    }

    async fn publish(&self, content: &Content) -> Result<PublishReceipt, PublishError> {
        let n = self.stub.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let behavior = self.stub.behavior.lock().unwrap().clone();
        match behavior {
            Behavior::Succeed => {}
            Behavior::Fail(err) => return Err(err),
            Behavior::Block(notify) => notify.notified().await,
            Behavior::SlowFail(delay, err) => {
                tokio::time::sleep(delay).await;
                return Err(err);
            }
        }
        Ok(PublishReceipt {
            url: format!("https://social.example/{}/{}", content.id, n),
            platform_post_id: format!("post-{}", n),
        })
    }

    async fn test_connection(&self, _credentials: &Value) -> ConnectionTest {
        ConnectionTest::ok("stub", Value::Null)
    }
}

pub fn content() -> Content {
    Content {
        id: CONTENT_ID.to_string(),
        user_id: USER_ID.to_string(),
        campaign_id: Some("campaign-1".to_string()),
        title: "Launch day".to_string(),
        body: "We shipped.".to_string(),
        excerpt: None,
        canonical_url: Some("https://blog.example/launch".to_string()),
        tags: vec![],
    }
}

pub fn destination(platform: &str, active: bool) -> Destination {
    Destination {
        id: DESTINATION_ID.to_string(),
        platform: platform.to_string(),
        config: json!({ "url": "https://hooks.example/publish" }),
        active,
    }
}

/// Retry budget 3, no backoff floor, fast polling.
pub fn test_config() -> SchedulerConfig {
    SchedulerConfig::default()
        .with_backoff(BackoffPolicy::none())
        .with_poll_interval(Duration::from_millis(50))
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub stub: Stub,
    pub log: Arc<InMemoryDeliveryLog>,
    pub scheduler: Scheduler,
}

impl Harness {
    pub async fn new(config: SchedulerConfig, subscriptions: Vec<WebhookSubscription>) -> Self {
        Self::with_destination(config, subscriptions, destination("webhook", true)).await
    }

    pub async fn with_destination(
        config: SchedulerConfig,
        subscriptions: Vec<WebhookSubscription>,
        destination: Destination,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        store.put_content(content()).await;
        store.put_destination(destination).await;

        let stub = Stub::new(Behavior::Succeed);
        let log = Arc::new(InMemoryDeliveryLog::default());
        let webhooks =
            Arc::new(WebhookDispatcher::new(DeliveryConfig::default()).with_log(log.clone()));

        let coordinator = Coordinator::new(store.clone(), store.clone(), stub.registry())
            .with_webhooks(webhooks, Arc::new(StaticSubscriptions::new(subscriptions)))
            .with_config(config);

        Self {
            store,
            stub,
            log,
            scheduler: Scheduler::new(Arc::new(coordinator)),
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        self.scheduler.coordinator()
    }

    /// A pending schedule that became due a second ago.
    pub async fn due_schedule(&self) -> Schedule {
        let publish_at = Utc::now() - chrono::Duration::milliseconds(1000);
        self.scheduler
            .enqueue(NewSchedule::at(CONTENT_ID, DESTINATION_ID, publish_at).with_campaign("campaign-1"))
            .await
            .unwrap()
    }

    pub async fn get(&self, id: &str) -> Schedule {
        self.store.get(id).await.unwrap().unwrap()
    }
}
