//! REST API module for HTTP endpoints
//!
//! Provides the ingestion and read endpoints under `/api/v1/audit`:
//! - `POST /events` - Submit an event (unauthenticated)
//! - `GET /feed` - Latest events from the recency cache
//! - `GET /history` - Paged events from the durable log
//! - `GET /agents/:agent_id/events` - Paged events for one source agent
//! - `GET /agents/:agent_id/stats` - Per-agent activity summary

pub mod events;
pub mod feed;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Durable-log page size when none is given
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Largest durable-log page
pub const MAX_HISTORY_LIMIT: usize = 1000;

/// Common pagination parameters.
///
/// Values are kept as raw strings: anything that is not a positive integer
/// (or, for offset, a non-negative one) falls back to the default instead of
/// failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl PaginationParams {
    /// Positive limit, or None when missing or unparseable
    pub fn requested_limit(&self) -> Option<usize> {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
    }

    /// Limit for durable-log reads: default 100, max 1000
    pub fn history_limit(&self) -> usize {
        self.requested_limit()
            .map(|n| n.min(MAX_HISTORY_LIMIT))
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
    }

    pub fn offset(&self) -> usize {
        self.offset
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }

    /// Pair with a status code as a response
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Response {
        (status, Json(Self::new(message))).into_response()
    }

    pub fn bad_request(message: impl Into<String>) -> Response {
        Self::with_status(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Response {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}
