//! Integration tests for the HTTP API
//!
//! Requests go straight into the router with `tower::ServiceExt::oneshot`;
//! adapters are the in-memory ones.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use audit_stream::api::{create_router, AppState, Claims, JwtVerifier};
use audit_stream::cache::{MemoryRecencyCache, RecencyCache};
use audit_stream::hub::{Hub, HubConfig};
use audit_stream::pipeline::{intake_queue, IntakeQueue, IntakeReceiver};
use audit_stream::storage::{DurableLog, MemoryEventLog};
use audit_stream::types::{Event, SourceAgent};

const PRIVATE_KEY: &str = include_str!("fixtures/jwt_private.pem");
const PUBLIC_KEY: &str = include_str!("fixtures/jwt_public.pem");

struct TestApp {
    router: Router,
    queue: IntakeQueue,
    cache: Arc<MemoryRecencyCache>,
    log: Arc<MemoryEventLog>,
    // Held so the queue stays open; nothing consumes it
    _intake: IntakeReceiver,
}

fn setup(queue_capacity: usize) -> TestApp {
    let (queue, intake) = intake_queue(queue_capacity);
    let cache = Arc::new(MemoryRecencyCache::new());
    let log = Arc::new(MemoryEventLog::new());
    let verifier = JwtVerifier::from_pem(PUBLIC_KEY.as_bytes()).unwrap();

    let state = AppState::new(
        queue.clone(),
        cache.clone(),
        log.clone(),
        Hub::spawn(HubConfig::default()),
        verifier,
    );

    TestApp {
        router: create_router(Arc::new(state)),
        queue,
        cache,
        log,
        _intake: intake,
    }
}

fn token(exp_offset: i64) -> String {
    let claims = Claims {
        sub: "dashboard".to_string(),
        scope: "audit:read".to_string(),
        exp: Utc::now().timestamp() + exp_offset,
    };
    let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap();
    encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
}

fn post_event(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/audit/events")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token(3600)))
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn stored_event(event_type: &str, agent: &str, offset_secs: i64) -> Event {
    let t = "2024-03-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
    Event::new(event_type, SourceAgent::new(agent), t)
        .enriched(t + chrono::Duration::seconds(offset_secs))
}

fn valid_body(event_type: &str) -> String {
    json!({
        "event_type": event_type,
        "source_agent": {"agent_id": "a1", "name": "Ada", "race": {"type": "elf"}},
        "timestamp": "2024-03-01T12:00:00Z",
        "data": {"message": "hello", "tick": 3}
    })
    .to_string()
}

#[tokio::test]
async fn test_post_event_accepted() {
    let app = setup(10);

    let response = send(&app, post_event(&valid_body("speak"))).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["type"], "speak");
    assert!(body["timestamp"].is_string());
    assert_eq!(app.queue.len(), 1);
}

#[tokio::test]
async fn test_post_event_validation() {
    let app = setup(10);

    let cases = [
        (json!({"source_agent": {"agent_id": "a1"}, "timestamp": "2024-03-01T12:00:00Z"}), "event_type is required"),
        (json!({"event_type": "", "source_agent": {"agent_id": "a1"}, "timestamp": "2024-03-01T12:00:00Z"}), "event_type is required"),
        (json!({"event_type": "speak", "timestamp": "2024-03-01T12:00:00Z"}), "source_agent is required"),
        (json!({"event_type": "speak", "source_agent": {"agent_id": "a1"}}), "timestamp is required"),
    ];

    for (body, message) in cases {
        let response = send(&app, post_event(&body.to_string())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], message);
    }

    let response = send(&app, post_event("{not json")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid json");

    assert!(app.queue.is_empty());
}

#[tokio::test]
async fn test_post_event_queue_full() {
    let app = setup(2);

    for _ in 0..2 {
        let response = send(&app, post_event(&valid_body("speak"))).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    let response = send(&app, post_event(&valid_body("speak"))).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["error"], "too many events");
}

#[tokio::test]
async fn test_post_event_after_close() {
    let app = setup(10);
    app.queue.close();

    let response = send(&app, post_event(&valid_body("speak"))).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_feed_newest_first() {
    let app = setup(10);
    for n in 0..3 {
        app.cache
            .save(&stored_event(&format!("e{}", n), "a1", n))
            .await
            .unwrap();
    }

    let response = send(&app, authed_get("/api/v1/audit/feed?limit=2")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["source"], "memory");
    assert_eq!(body["events"][0]["event_type"], "e2");
    assert_eq!(body["events"][1]["event_type"], "e1");

    // Unparseable limit falls back to the default
    let body = body_json(send(&app, authed_get("/api/v1/audit/feed?limit=lots")).await).await;
    assert_eq!(body["limit"], 20);
    assert_eq!(body["count"], 3);
}

#[tokio::test]
async fn test_history_and_agent_views() {
    let app = setup(10);
    let events = vec![
        stored_event("speak", "a1", 0),
        stored_event("move", "a2", 1),
        stored_event("speak", "a1", 2),
    ];
    app.log.batch_insert(&events).await.unwrap();

    let body = body_json(send(&app, authed_get("/api/v1/audit/history?limit=2&offset=0")).await).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["count"], 2);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["source"], "memory");

    let body = body_json(send(&app, authed_get("/api/v1/audit/history?event_type=move")).await).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["events"][0]["source_agent"]["agent_id"], "a2");

    let body = body_json(send(&app, authed_get("/api/v1/audit/agents/a1/events")).await).await;
    assert_eq!(body["agent_id"], "a1");
    assert_eq!(body["total"], 2);
    assert_eq!(body["limit"], 100);

    let body = body_json(send(&app, authed_get("/api/v1/audit/agents/a1/stats")).await).await;
    assert_eq!(body["agent_id"], "a1");
    assert_eq!(body["total_events"], 2);
    assert_eq!(body["events_by_type"]["speak"], 2);
}

#[tokio::test]
async fn test_auth_errors() {
    let app = setup(10);

    let response = send(
        &app,
        Request::builder()
            .uri("/api/v1/audit/history")
            .header(header::AUTHORIZATION, token(3600))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error"],
        "invalid authorization format, expected: Bearer <token>"
    );

    let response = send(
        &app,
        Request::builder()
            .uri("/api/v1/audit/feed")
            .header(header::AUTHORIZATION, format!("Bearer {}", token(-3600)))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "token expired");

    let response = send(
        &app,
        Request::builder()
            .uri("/api/v1/audit/ws/stats")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "missing token query parameter");
}

#[tokio::test]
async fn test_ws_stats_with_query_token() {
    let app = setup(10);
    let uri = format!("/api/v1/audit/ws/stats?token={}", token(3600));

    let response = send(
        &app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["connected_clients"], 0);
}
