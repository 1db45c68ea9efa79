//! Event ingestion endpoint

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::ApiError;
use crate::api::state::AppState;
use crate::pipeline::SubmitError;
use crate::types::EventSubmission;

/// Body of a 202 response
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Acceptance time, RFC 3339
    pub timestamp: String,
}

/// POST /api/v1/audit/events - Validate and enqueue one event
///
/// Never waits for processing: the event is either admitted to the intake
/// queue (202) or rejected immediately (429 when full, 503 when shutting down).
pub async fn post_event(
    State(state): State<Arc<AppState>>,
    body: Result<Json<EventSubmission>, JsonRejection>,
) -> Response {
    let Json(submission) = match body {
        Ok(body) => body,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected event body");
            return ApiError::bad_request("invalid json");
        }
    };

    let event = match submission.validate() {
        Ok(event) => event,
        Err(e) => return ApiError::bad_request(e.to_string()),
    };
    let event_type = event.event_type.clone();

    match state.queue.submit(event) {
        Ok(()) => {
            let accepted = AcceptedResponse {
                status: "accepted",
                event_type,
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            };
            (StatusCode::ACCEPTED, Json(accepted)).into_response()
        }
        Err(SubmitError::QueueFull) => {
            warn!(event_type = %event_type, capacity = state.queue.capacity(), "Intake queue full, rejecting event");
            ApiError::with_status(StatusCode::TOO_MANY_REQUESTS, SubmitError::QueueFull.to_string())
        }
        Err(SubmitError::Closed) => {
            ApiError::with_status(StatusCode::SERVICE_UNAVAILABLE, "service is shutting down")
        }
    }
}
