//! API module for HTTP and WebSocket endpoints
//!
//! Event ingestion, the read endpoints over the cache and durable log, and
//! live delivery over WebSocket.

pub mod auth;
pub mod http;
pub mod rest;
pub mod state;
pub mod websocket;

pub use auth::{AuthError, Claims, JwtVerifier};
pub use http::{create_router, API_PREFIX};
pub use state::AppState;
