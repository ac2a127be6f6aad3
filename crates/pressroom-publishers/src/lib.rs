//! Destination publishers for Pressroom.
//!
//! This crate defines the contract every platform adapter implements and the
//! registry the scheduler uses to resolve an adapter from a destination's
//! platform tag.
//!
//! ## Features
//!
//! - **Publisher**: authenticate, publish, and check a single platform
//! - **Registry**: static map from [`PlatformType`] to adapter factory
//! - **Adapters**: Bluesky, Mastodon, WordPress, and a generic webhook

pub mod adapters;
mod error;
mod publisher;
mod registry;
mod types;

pub use error::PublishError;
pub use publisher::Publisher;
pub use registry::{PublisherFactory, PublisherRegistry, default_http_client};
pub use types::{Content, ConnectionTest, Destination, PlatformType, PublishReceipt};
