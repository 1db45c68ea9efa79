//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{
    extract::State,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{require_bearer, require_query_token};
use super::rest::{events, feed};
use super::state::AppState;
use super::websocket::{ws_handler, ws_stats};

/// Prefix for every audit endpoint
pub const API_PREFIX: &str = "/api/v1/audit";

/// GET /health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ws_clients: usize,
}

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration - allow all origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Read endpoints: bearer token
    let reads = Router::new()
        .route("/feed", get(feed::get_feed))
        .route("/history", get(feed::get_history))
        .route("/agents/:agent_id/events", get(feed::get_agent_events))
        .route("/agents/:agent_id/stats", get(feed::get_agent_stats))
        .route_layer(from_fn_with_state(state.auth.clone(), require_bearer));

    // Live endpoints: token in the query string
    let live = Router::new()
        .route("/ws", get(ws_handler))
        .route("/ws/stats", get(ws_stats))
        .route_layer(from_fn_with_state(state.auth.clone(), require_query_token));

    let audit = Router::new()
        .route("/events", post(events::post_event))
        .merge(reads)
        .merge(live);

    Router::new()
        .route("/health", get(health_check))
        .nest(API_PREFIX, audit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ws_clients: state.hub.client_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::JwtVerifier;
    use crate::cache::MemoryRecencyCache;
    use crate::hub::{Hub, HubConfig};
    use crate::pipeline::intake_queue;
    use crate::storage::MemoryEventLog;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    fn app() -> Router {
        let verifier =
            JwtVerifier::from_pem(include_bytes!("../../tests/fixtures/jwt_public.pem")).unwrap();
        let (queue, _rx) = intake_queue(4);
        let state = AppState::new(
            queue,
            Arc::new(MemoryRecencyCache::new()),
            Arc::new(MemoryEventLog::new()),
            Hub::spawn(HubConfig::default()),
            verifier,
        );
        create_router(Arc::new(state))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["ws_clients"], 0);
    }

    #[tokio::test]
    async fn test_reads_require_bearer() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/audit/feed")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "missing authorization header");
    }

    #[tokio::test]
    async fn test_ws_stats_requires_query_token() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/audit/ws/stats?token=garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "invalid token");
    }
}
