//! Paged read results from the durable log

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Event;

/// One page of events plus the total number matching the query
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventPage {
    pub events: Vec<Event>,
    pub total: i64,
}

impl EventPage {
    pub fn new(events: Vec<Event>, total: i64) -> Self {
        Self { events, total }
    }
}

/// Aggregate activity of a single source agent
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentStats {
    pub agent_id: String,
    pub total_events: i64,
    pub events_by_type: BTreeMap<String, i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_event_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<DateTime<Utc>>,
}

impl AgentStats {
    pub fn empty(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Default::default()
        }
    }

    /// Fold one per-type group into the totals
    pub fn record(
        &mut self,
        event_type: &str,
        count: i64,
        first: Option<DateTime<Utc>>,
        last: Option<DateTime<Utc>>,
    ) {
        self.total_events += count;
        *self.events_by_type.entry(event_type.to_string()).or_insert(0) += count;
        self.first_event_at = match (self.first_event_at, first) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.last_event_at = match (self.last_event_at, last) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}
