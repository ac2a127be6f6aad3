//! Web routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::info;

use pressroom_scheduler::Scheduler;

use crate::WebError;

/// Shared state for the web server.
pub struct AppState {
    pub scheduler: Scheduler,
}

/// A control action posted to `/api/scheduler`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SchedulerAction {
    /// Run one poll pass now.
    CheckPending,
    /// Requeue a failed schedule.
    Retry {
        #[serde(rename = "scheduleId")]
        schedule_id: String,
    },
    /// Process a pending schedule immediately, ignoring its publish time.
    PublishNow {
        #[serde(rename = "scheduleId")]
        schedule_id: String,
    },
    Cancel {
        #[serde(rename = "scheduleId")]
        schedule_id: String,
    },
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    action: Option<String>,
}

/// Create the web router.
pub fn create_router(scheduler: Scheduler) -> Router {
    let state = Arc::new(AppState { scheduler });

    Router::new()
        .route("/api/scheduler", get(query).post(act))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.scheduler.status().await;
    Json(json!({
        "status": "ok",
        "scheduler": status,
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Value>, WebError> {
    let scheduler = &state.scheduler;
    match params.action.as_deref() {
        Some("health") => Ok(Json(json!(scheduler.health().await?))),
        Some("status") => Ok(Json(json!(scheduler.status().await))),
        Some(other) => Err(WebError::BadRequest(format!("unknown action: {}", other))),
        None => Err(WebError::BadRequest("missing action".to_string())),
    }
}

async fn act(
    State(state): State<Arc<AppState>>,
    Json(action): Json<SchedulerAction>,
) -> Result<Json<Value>, WebError> {
    info!(?action, "control action");
    let scheduler = &state.scheduler;
    let coordinator = scheduler.coordinator();

    let body = match action {
        SchedulerAction::CheckPending => {
            let report = scheduler.trigger_now().await?;
            json!({ "success": true, "report": report })
        }
        SchedulerAction::Retry { schedule_id } => {
            let schedule = coordinator.retry(&schedule_id).await?;
            json!({ "success": true, "schedule": schedule })
        }
        SchedulerAction::PublishNow { schedule_id } => {
            let outcome = coordinator.publish_now(&schedule_id).await?;
            json!({ "success": true, "result": outcome })
        }
        SchedulerAction::Cancel { schedule_id } => {
            let schedule = coordinator.cancel(&schedule_id).await?;
            json!({ "success": true, "schedule": schedule })
        }
    };
    Ok(Json(body))
}
