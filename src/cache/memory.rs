//! In-process recency cache with the same semantics as the Redis sorted set.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CacheResult, RecencyCache, RECENT_CAPACITY};
use crate::types::Event;

/// Score key: processing instant in microseconds, then insertion sequence
/// so equal instants keep processing order.
type ScoreKey = (i64, u64);

#[derive(Default)]
struct Window {
    members: BTreeMap<ScoreKey, String>,
    next_seq: u64,
}

/// Ordered map of serialized events, trimmed to capacity after every insert
pub struct MemoryRecencyCache {
    window: Mutex<Window>,
    capacity: usize,
}

impl MemoryRecencyCache {
    pub fn new() -> Self {
        Self::with_capacity(RECENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            window: Mutex::new(Window::default()),
            capacity,
        }
    }

    /// Number of events currently held
    pub fn len(&self) -> usize {
        self.window.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryRecencyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecencyCache for MemoryRecencyCache {
    async fn save_serialized(&self, event: &Event, member: &str) -> CacheResult<()> {
        let score = event.ordering_instant().timestamp_micros();

        let mut window = self.window.lock();
        let seq = window.next_seq;
        window.next_seq += 1;
        window.members.insert((score, seq), member.to_string());

        while window.members.len() > self.capacity {
            window.members.pop_first();
        }
        Ok(())
    }

    async fn recent(&self, count: usize) -> CacheResult<Vec<Event>> {
        let members: Vec<String> = {
            let window = self.window.lock();
            window.members.values().rev().take(count).cloned().collect()
        };

        members
            .iter()
            .map(|m| serde_json::from_str(m).map_err(Into::into))
            .collect()
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
