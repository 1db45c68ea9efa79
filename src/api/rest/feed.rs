//! Read endpoints: recency feed, history, per-agent views

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::{ApiError, PaginationParams};
use crate::api::state::AppState;
use crate::cache::clamp_limit;
use crate::types::Event;

/// GET /feed response
#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub events: Vec<Event>,
    pub count: usize,
    pub limit: usize,
    pub source: &'static str,
}

/// GET /history and GET /agents/:agent_id/events response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    pub events: Vec<Event>,
    pub count: usize,
    pub limit: usize,
    pub offset: usize,
    /// Rows matching the query; absent for type-filtered reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    pub source: &'static str,
}

/// Query parameters for history
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub event_type: Option<String>,
}

/// GET /api/v1/audit/feed - Latest events, newest first
pub async fn get_feed(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Response {
    let requested = params.requested_limit();

    match state.cache.get_recent(requested).await {
        Ok(events) => Json(FeedResponse {
            count: events.len(),
            limit: clamp_limit(requested),
            source: state.cache.backend(),
            events,
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to read recency cache");
            ApiError::internal("failed to get feed")
        }
    }
}

/// GET /api/v1/audit/history - Durable log, newest first
///
/// With `event_type` the page is restricted to that type and no total is
/// reported.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let page = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };
    let limit = page.history_limit();
    let offset = page.offset();
    let source = state.log.backend();

    let result = match params.event_type.as_deref().filter(|t| !t.is_empty()) {
        Some(event_type) => state
            .log
            .list_by_type(event_type, limit)
            .await
            .map(|events| HistoryResponse {
                agent_id: None,
                event_type: Some(event_type.to_string()),
                count: events.len(),
                events,
                limit,
                offset: 0,
                total: None,
                source,
            }),
        None => state
            .log
            .list_recent(limit, offset)
            .await
            .map(|page| HistoryResponse {
                agent_id: None,
                event_type: None,
                count: page.events.len(),
                events: page.events,
                limit,
                offset,
                total: Some(page.total),
                source,
            }),
    };

    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to read durable log");
            ApiError::internal("failed to get history")
        }
    }
}

/// GET /api/v1/audit/agents/:agent_id/events - One agent's events, newest first
pub async fn get_agent_events(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Response {
    let limit = params.history_limit();
    let offset = params.offset();

    match state.log.list_by_agent(&agent_id, limit, offset).await {
        Ok(page) => Json(HistoryResponse {
            agent_id: Some(agent_id),
            event_type: None,
            count: page.events.len(),
            events: page.events,
            limit,
            offset,
            total: Some(page.total),
            source: state.log.backend(),
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, agent_id = %agent_id, "Failed to read agent events");
            ApiError::internal("failed to get agent events")
        }
    }
}

/// GET /api/v1/audit/agents/:agent_id/stats
pub async fn get_agent_stats(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Response {
    match state.log.agent_stats(&agent_id).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!(error = %e, agent_id = %agent_id, "Failed to read agent stats");
            ApiError::internal("failed to get agent stats")
        }
    }
}
