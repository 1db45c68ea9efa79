//! Recency cache
//!
//! A sliding window over the most recent [`RECENT_CAPACITY`] processed events,
//! ordered by processing instant. It serves the cheap "latest events" feed and
//! is never a source of truth: the pipeline logs and ignores cache failures.
//!
//! Two adapters implement [`RecencyCache`]:
//! - [`RedisRecencyCache`]: a Redis sorted set, trimmed by rank after each insert
//! - [`MemoryRecencyCache`]: an in-process ordered map with the same semantics

mod memory;
mod redis;

pub use memory::MemoryRecencyCache;
pub use redis::RedisRecencyCache;

use async_trait::async_trait;

use crate::types::Event;

/// Maximum number of events kept in the window
pub const RECENT_CAPACITY: usize = 100;

/// Feed size when the caller gives no limit
pub const DEFAULT_FEED_LIMIT: usize = 20;

/// Largest feed a caller may request
pub const MAX_FEED_LIMIT: usize = 100;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Normalize a requested feed size: missing or zero means the default,
/// anything above the maximum is clamped.
pub fn clamp_limit(limit: Option<usize>) -> usize {
    match limit {
        None | Some(0) => DEFAULT_FEED_LIMIT,
        Some(n) => n.min(MAX_FEED_LIMIT),
    }
}

/// Score-ordered window of the latest events
#[async_trait]
pub trait RecencyCache: Send + Sync {
    /// Insert `member`, the serialized form of `event`, at the event's
    /// processing instant and trim to capacity
    async fn save_serialized(&self, event: &Event, member: &str) -> CacheResult<()>;

    /// Up to `count` most recent events, newest first (no clamping)
    async fn recent(&self, count: usize) -> CacheResult<Vec<Event>>;

    /// Short backend name reported by the feed endpoint
    fn backend(&self) -> &'static str;

    /// Serialize and insert an event
    async fn save(&self, event: &Event) -> CacheResult<()> {
        let member = serde_json::to_string(event)?;
        self.save_serialized(event, &member).await
    }

    /// Latest events for the feed, newest first, with the limit clamped
    async fn get_recent(&self, limit: Option<usize>) -> CacheResult<Vec<Event>> {
        self.recent(clamp_limit(limit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 20);
        assert_eq!(clamp_limit(Some(0)), 20);
        assert_eq!(clamp_limit(Some(1)), 1);
        assert_eq!(clamp_limit(Some(100)), 100);
        assert_eq!(clamp_limit(Some(5000)), 100);
    }
}
