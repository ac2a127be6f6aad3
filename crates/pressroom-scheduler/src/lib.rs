//! Publishing scheduler for Pressroom.
//!
//! This crate turns "publish content X to destination Y at time T" records
//! into delivered publications:
//! - A [`Scheduler`] polls for due schedules on a fixed interval
//! - A [`Coordinator`] claims each one with a conditional store write,
//!   publishes through the registry, and records the outcome
//! - Failed attempts back off and retry up to a bounded budget
//! - Claims abandoned by a crashed worker are recovered by a sweep
//! - Terminal outcomes are announced as `publish.success` / `publish.failed` webhooks

mod backoff;
mod config;
mod coordinator;
mod error;
mod health;
mod scheduler;
pub mod store;
mod types;

pub use backoff::{BackoffPolicy, backoff_delay};
pub use config::SchedulerConfig;
pub use coordinator::{Coordinator, ProcessOutcome};
pub use error::{SchedulerError, StoreError};
pub use health::{ActivityEntry, HealthReport};
pub use scheduler::{Scheduler, SchedulerStatus, TickReport};
pub use store::{Catalog, MemoryStore, ScheduleStore, SqliteStore};
pub use types::{Claim, NewSchedule, Schedule, ScheduleStatus, ScheduleUpdate, StatusCounts};
