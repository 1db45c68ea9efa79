//! Shared application state for HTTP and WebSocket handlers

use std::sync::Arc;

use crate::api::auth::{JwtVerifier, SharedVerifier};
use crate::cache::RecencyCache;
use crate::hub::HubHandle;
use crate::pipeline::IntakeQueue;
use crate::storage::DurableLog;

/// Everything a handler may touch. Handlers never see concrete adapters.
pub struct AppState {
    /// Producer side of the intake queue
    pub queue: IntakeQueue,

    /// Recency cache backing the feed
    pub cache: Arc<dyn RecencyCache>,

    /// Durable log backing history and agent views
    pub log: Arc<dyn DurableLog>,

    /// Broadcast hub for live subscribers
    pub hub: HubHandle,

    /// Token verifier for the protected routes
    pub auth: SharedVerifier,
}

impl AppState {
    pub fn new(
        queue: IntakeQueue,
        cache: Arc<dyn RecencyCache>,
        log: Arc<dyn DurableLog>,
        hub: HubHandle,
        auth: JwtVerifier,
    ) -> Self {
        Self {
            queue,
            cache,
            log,
            hub,
            auth: Arc::new(auth),
        }
    }
}
