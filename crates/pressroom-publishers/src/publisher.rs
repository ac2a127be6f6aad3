//! The uniform contract every platform adapter implements.

use async_trait::async_trait;
use serde_json::Value;

use crate::{ConnectionTest, Content, PlatformType, PublishError, PublishReceipt};

/// Publishes content to exactly one platform.
///
/// An instance is created per attempt by the registry, so `authenticate`
/// may keep session state on `self` for the following `publish` call.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// The platform this adapter talks to.
    fn platform(&self) -> PlatformType;

    /// Establish a session from the destination's credential blob.
    async fn authenticate(&mut self, credentials: &Value) -> Result<(), PublishError>;

    /// Deliver the content. Requires a prior successful `authenticate`.
    async fn publish(&self, content: &Content) -> Result<PublishReceipt, PublishError>;

    /// Read-only check used by settings tooling. Never called by the scheduler.
    async fn test_connection(&self, credentials: &Value) -> ConnectionTest;
}
