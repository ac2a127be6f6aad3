//! HTTP control surface for the Pressroom scheduler.
//!
//! `POST /api/scheduler` takes an `{action, scheduleId?}` body
//! (`checkPending`, `retry`, `publishNow`, `cancel`); `GET /api/scheduler`
//! answers `?action=health` and `?action=status`.

mod error;
mod routes;

pub use error::WebError;
pub use routes::{AppState, SchedulerAction, create_router};
