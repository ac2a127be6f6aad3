//! Error types for the control surface.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use pressroom_scheduler::SchedulerError;

/// Errors returned by control-surface handlers.
#[derive(Debug, Error)]
pub enum WebError {
    /// Scheduler error.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// The request was understood but names no supported action.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl WebError {
    fn status(&self) -> StatusCode {
        match self {
            WebError::Scheduler(SchedulerError::NotFound(_)) => StatusCode::NOT_FOUND,
            WebError::Scheduler(SchedulerError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            WebError::Scheduler(SchedulerError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}
