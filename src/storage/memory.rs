//! In-process durable log.
//!
//! Rows go through the same [`EventRow`] mapping as PostgreSQL so reads return
//! exactly what a database round trip would. Used by the `memory` backend and
//! by tests, which can also inspect batch boundaries and inject failures.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{DurableLog, EventRow, StorageError, StorageResult};
use crate::types::{AgentStats, Event, EventPage};

#[derive(Default)]
struct Table {
    rows: Vec<EventRow>,
    next_id: i64,
    batch_sizes: Vec<usize>,
}

/// Vec-backed event log
#[derive(Default)]
pub struct MemoryEventLog {
    table: Mutex<Table>,
    fail_next: AtomicU32,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` batch inserts fail
    pub fn fail_next_inserts(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Sizes of every successful batch insert, in call order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.table.lock().batch_sizes.clone()
    }

    /// All stored events in insertion order
    pub fn all_events(&self) -> Vec<Event> {
        self.table
            .lock()
            .rows
            .iter()
            .cloned()
            .map(EventRow::into_event)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn page_where<F>(&self, filter: F, limit: usize, offset: usize) -> EventPage
    where
        F: Fn(&EventRow) -> bool,
    {
        let table = self.table.lock();
        let matching: Vec<&EventRow> = table.rows.iter().filter(|r| filter(r)).collect();
        let total = matching.len() as i64;
        let events = matching
            .into_iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .map(EventRow::into_event)
            .collect();
        EventPage::new(events, total)
    }
}

#[async_trait]
impl DurableLog for MemoryEventLog {
    async fn batch_insert(&self, events: &[Event]) -> StorageResult<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StorageError::Unavailable("injected failure".to_string()));
        }

        let rows = events
            .iter()
            .map(EventRow::from_event)
            .collect::<StorageResult<Vec<_>>>()?;

        let mut table = self.table.lock();
        let now = Utc::now();
        for mut row in rows {
            table.next_id += 1;
            row.id = table.next_id;
            row.created_at = Some(now);
            table.rows.push(row);
        }
        table.batch_sizes.push(events.len());
        Ok(events.len() as u64)
    }

    async fn list_recent(&self, limit: usize, offset: usize) -> StorageResult<EventPage> {
        Ok(self.page_where(|_| true, limit, offset))
    }

    async fn list_by_agent(
        &self,
        agent_id: &str,
        limit: usize,
        offset: usize,
    ) -> StorageResult<EventPage> {
        Ok(self.page_where(|r| r.source_agent_id == agent_id, limit, offset))
    }

    async fn list_by_type(&self, event_type: &str, limit: usize) -> StorageResult<Vec<Event>> {
        Ok(self
            .page_where(|r| r.event_type == event_type, limit, 0)
            .events)
    }

    async fn agent_stats(&self, agent_id: &str) -> StorageResult<AgentStats> {
        let table = self.table.lock();
        let mut stats = AgentStats::empty(agent_id);
        for row in table.rows.iter().filter(|r| r.source_agent_id == agent_id) {
            stats.record(
                &row.event_type,
                1,
                Some(row.processed_at),
                Some(row.processed_at),
            );
        }
        Ok(stats)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceAgent;
    use chrono::{DateTime, Duration};

    fn event(event_type: &str, agent: &str, n: i64) -> Event {
        let base = "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        Event::new(event_type, SourceAgent::new(agent), base)
            .enriched(base + Duration::seconds(n))
    }

    #[tokio::test]
    async fn test_list_recent_pages_newest_first() {
        let log = MemoryEventLog::new();
        let batch: Vec<Event> = (0..5).map(|n| event(&format!("t{}", n), "a1", n)).collect();
        assert_eq!(log.batch_insert(&batch).await.unwrap(), 5);

        let page = log.list_recent(2, 1).await.unwrap();
        assert_eq!(page.total, 5);
        let types: Vec<_> = page.events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["t3", "t2"]);
    }

    #[tokio::test]
    async fn test_filters_by_agent_and_type() {
        let log = MemoryEventLog::new();
        log.batch_insert(&[
            event("speak", "a1", 0),
            event("move", "a1", 1),
            event("speak", "b2", 2),
            event("speak", "a1", 3),
        ])
        .await
        .unwrap();

        let page = log.list_by_agent("a1", 10, 0).await.unwrap();
        assert_eq!(page.total, 3);
        assert!(page.events.iter().all(|e| e.source_agent.agent_id == "a1"));

        let speaks = log.list_by_type("speak", 2).await.unwrap();
        assert_eq!(speaks.len(), 2);
        assert_eq!(speaks[0].source_agent.agent_id, "a1");
        assert_eq!(speaks[1].source_agent.agent_id, "b2");
    }

    #[tokio::test]
    async fn test_agent_stats() {
        let log = MemoryEventLog::new();
        log.batch_insert(&[
            event("speak", "a1", 0),
            event("move", "a1", 5),
            event("speak", "a1", 9),
            event("speak", "b2", 20),
        ])
        .await
        .unwrap();

        let stats = log.agent_stats("a1").await.unwrap();
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.events_by_type["speak"], 2);
        assert_eq!(stats.events_by_type["move"], 1);
        let span = stats.last_event_at.unwrap() - stats.first_event_at.unwrap();
        assert_eq!(span, Duration::seconds(9));

        let none = log.agent_stats("zz").await.unwrap();
        assert_eq!(none.total_events, 0);
        assert!(none.first_event_at.is_none());
    }

    #[tokio::test]
    async fn test_injected_failure_writes_nothing() {
        let log = MemoryEventLog::new();
        log.fail_next_inserts(1);

        assert!(log.batch_insert(&[event("speak", "a1", 0)]).await.is_err());
        assert!(log.is_empty());

        log.batch_insert(&[event("speak", "a1", 1)]).await.unwrap();
        assert_eq!(log.batch_sizes(), vec![1]);
    }
}
