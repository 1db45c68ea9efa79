//! WebSocket module for live event delivery
//!
//! Provides the endpoint at `/api/v1/audit/ws`. Each connection registers
//! with the broadcast hub and receives every processed event as a JSON text
//! frame, in processing order.
//!
//! ## Per-connection tasks
//! - write pump: hub payloads out, keep-alive pings, close on eviction
//! - read pump: discards client input, detects disconnect

pub mod handler;

pub use handler::{ws_handler, ws_stats, WsStats};
