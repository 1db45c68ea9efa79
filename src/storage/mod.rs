//! Durable event log
//!
//! Append-only storage of every processed event, written in batches by the
//! batch accumulator and read back page by page for history queries.
//!
//! ```text
//! Write Path:
//! ┌──────────────┐    ┌───────────────┐    ┌──────────────────┐
//! │ BatchAccum.  │───►│ EventRow::from│───►│ INSERT ... VALUES│
//! │ flush (1s)   │    │ (JSON-encode) │    │ chunks of 100    │
//! └──────────────┘    └───────────────┘    └──────────────────┘
//!
//! Read Path:
//! ┌──────────────┐    ┌───────────────┐
//! │ ORDER BY     │───►│ EventRow::into│───► EventPage { events, total }
//! │ created_at ↓ │    │ _event        │
//! └──────────────┘    └───────────────┘
//! ```

mod memory;
mod postgres;
mod row;

pub use memory::MemoryEventLog;
pub use postgres::{PostgresConfig, PostgresEventLog};
pub use row::EventRow;

use async_trait::async_trait;

use crate::types::{AgentStats, Event, EventPage};

/// Rows per INSERT statement
pub const INSERT_CHUNK: usize = 100;

/// Result type for durable log operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in durable log operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Append-only, paginated event storage
#[async_trait]
pub trait DurableLog: Send + Sync {
    /// Insert every event in one batch operation, returning rows written
    async fn batch_insert(&self, events: &[Event]) -> StorageResult<u64>;

    /// Newest-first page of all events, with the total count
    async fn list_recent(&self, limit: usize, offset: usize) -> StorageResult<EventPage>;

    /// Newest-first page of events emitted by one source agent
    async fn list_by_agent(
        &self,
        agent_id: &str,
        limit: usize,
        offset: usize,
    ) -> StorageResult<EventPage>;

    /// Newest-first events of one type
    async fn list_by_type(&self, event_type: &str, limit: usize) -> StorageResult<Vec<Event>>;

    /// Per-type counts and activity span of one source agent
    async fn agent_stats(&self, agent_id: &str) -> StorageResult<AgentStats>;

    /// Short backend name reported by the history endpoint
    fn backend(&self) -> &'static str;
}
