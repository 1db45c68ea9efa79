//! Redis sorted-set recency cache.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{debug, info};

use super::{CacheResult, RecencyCache, RECENT_CAPACITY};
use crate::types::Event;
use crate::utils::epoch_score;

/// Sorted-set key holding the window
pub const RECENT_EVENTS_KEY: &str = "recent_events";

/// Redis recency cache.
///
/// Members are the serialized events, scores their processing instant in
/// epoch seconds. Insert and trim run as one atomic pipeline.
pub struct RedisRecencyCache {
    conn: ConnectionManager,
    key: String,
}

impl RedisRecencyCache {
    /// Connect to Redis.
    ///
    /// # Arguments
    /// * `addr` - host:port of the Redis server
    /// * `password` - optional password (empty means none)
    pub async fn connect(addr: &str, password: &str) -> CacheResult<Self> {
        let url = if password.is_empty() {
            format!("redis://{}/", addr)
        } else {
            format!("redis://:{}@{}/", password, addr)
        };
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        let mut cache = Self {
            conn,
            key: RECENT_EVENTS_KEY.to_string(),
        };
        cache.ping().await?;

        info!(addr = %addr, "Connected to Redis for recent events");
        Ok(cache)
    }

    async fn ping(&mut self) -> CacheResult<()> {
        let _pong: String = redis::cmd("PING").query_async(&mut self.conn).await?;
        Ok(())
    }
}

#[async_trait]
impl RecencyCache for RedisRecencyCache {
    async fn save_serialized(&self, event: &Event, member: &str) -> CacheResult<()> {
        let score = epoch_score(event.ordering_instant());
        let mut conn = self.conn.clone();

        // Keep ranks [-RECENT_CAPACITY, -1]: everything below is older.
        let _: () = redis::pipe()
            .atomic()
            .zadd(&self.key, member, score)
            .ignore()
            .zremrangebyrank(&self.key, 0, -(RECENT_CAPACITY as isize) - 1)
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!(event_type = %event.event_type, score, "Saved event to recent window");
        Ok(())
    }

    async fn recent(&self, count: usize) -> CacheResult<Vec<Event>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.zrevrange(&self.key, 0, count as isize - 1).await?;

        let mut events = Vec::with_capacity(members.len());
        for member in members {
            match serde_json::from_str::<Event>(&member) {
                Ok(event) => events.push(event),
                Err(e) => debug!(error = %e, "Skipping undecodable recent event"),
            }
        }
        Ok(events)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
