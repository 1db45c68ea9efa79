//! WebSocket connection handler

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, State,
    },
    response::{IntoResponse, Response},
    Json,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::api::auth::Claims;
use crate::api::state::AppState;
use crate::hub::Subscription;

/// Interval between keep-alive pings
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// GET /ws/stats response
#[derive(Debug, Serialize)]
pub struct WsStats {
    pub connected_clients: usize,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(claims): Extension<Claims>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, claims.sub))
}

/// GET /api/v1/audit/ws/stats
pub async fn ws_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(WsStats {
        connected_clients: state.hub.client_count(),
    })
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, subject: String) {
    let Some(subscription) = state.hub.register().await else {
        debug!("Hub stopped, closing new connection");
        return;
    };
    let id = subscription.id();
    info!(client = id, subject = %subject, "Live subscriber attached");

    let (sender, receiver) = socket.split();
    let mut write = tokio::spawn(write_pump(sender, subscription));
    let mut read = tokio::spawn(read_pump(receiver));

    // Either side ending ends the connection
    tokio::select! {
        _ = &mut write => read.abort(),
        _ = &mut read => write.abort(),
    }

    state.hub.unregister(id).await;
    debug!(client = id, subject = %subject, "Live subscriber detached");
}

/// Forward hub payloads to the client, with periodic pings.
///
/// Ends when the hub closes the subscription (client evicted or hub stopped)
/// or when a send fails.
async fn write_pump(mut sender: SplitSink<WebSocket, Message>, mut subscription: Subscription) {
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await;

    loop {
        tokio::select! {
            payload = subscription.recv() => match payload {
                Some(json) => {
                    if sender.send(Message::Text(json.to_string())).await.is_err() {
                        break; // Client disconnected
                    }
                }
                None => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = ping.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Drain client frames until the client closes or errors.
///
/// Client input carries no meaning; pings are answered by the socket itself.
async fn read_pump(mut receiver: SplitStream<WebSocket>) {
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "WebSocket read error");
                break;
            }
        }
    }
}
