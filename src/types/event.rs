//! Audit event types
//!
//! An [`Event`] is what producers submit and what flows through the pipeline.
//! Only the fields the pipeline inspects (`event_type`, `source_agent`,
//! `timestamp`) are strongly typed; everything else is carried verbatim as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Descriptor of the agent that produced an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceAgent {
    #[serde(default)]
    pub agent_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Value>,

    /// Any other descriptor fields (race, personality, ...) kept as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SourceAgent {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Default::default()
        }
    }
}

/// Reference to an agent an event was directed at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetAgent {
    #[serde(default)]
    pub agent_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Free-form event payload
///
/// The well-known keys get their own fields because the durable log indexes
/// them; anything else (sentiments, nested structures) lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_initiative: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_result: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An audit event
///
/// `processed_at` / `processed_ts` are stamped by the pipeline via
/// [`Event::enriched`] and are never accepted from producers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: String,

    pub source_agent: SourceAgent,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agents: Option<Vec<TargetAgent>>,

    /// Producer-supplied instant
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EventData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation_context: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_ts: Option<i64>,
}

impl Event {
    /// Create a bare event with only the required fields
    pub fn new(
        event_type: impl Into<String>,
        source_agent: SourceAgent,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            source_agent,
            target_agents: None,
            timestamp,
            data: None,
            simulation_context: None,
            processed_at: None,
            processed_ts: None,
        }
    }

    /// Stamp processing metadata.
    ///
    /// An already-enriched event keeps its original stamp.
    pub fn enriched(mut self, at: DateTime<Utc>) -> Self {
        if self.processed_at.is_none() {
            self.processed_at = Some(at);
            self.processed_ts = Some(at.timestamp());
        }
        self
    }

    pub fn is_enriched(&self) -> bool {
        self.processed_at.is_some()
    }

    /// Ordering instant: processing time, or the producer timestamp before enrichment
    pub fn ordering_instant(&self) -> DateTime<Utc> {
        self.processed_at.unwrap_or(self.timestamp)
    }
}

/// Request body accepted at the HTTP boundary
///
/// Every field is optional so missing required fields can be reported
/// individually instead of as a generic decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventSubmission {
    pub event_type: Option<String>,
    pub source_agent: Option<SourceAgent>,
    pub target_agents: Option<Vec<TargetAgent>>,
    pub timestamp: Option<DateTime<Utc>>,
    pub data: Option<EventData>,
    pub simulation_context: Option<Value>,
}

/// Missing or empty required field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("event_type is required")]
    MissingEventType,

    #[error("source_agent is required")]
    MissingSourceAgent,

    #[error("timestamp is required")]
    MissingTimestamp,
}

impl EventSubmission {
    /// Check required fields and build the pipeline event
    pub fn validate(self) -> Result<Event, ValidationError> {
        let event_type = self
            .event_type
            .filter(|t| !t.is_empty())
            .ok_or(ValidationError::MissingEventType)?;
        let source_agent = self.source_agent.ok_or(ValidationError::MissingSourceAgent)?;
        let timestamp = self.timestamp.ok_or(ValidationError::MissingTimestamp)?;

        Ok(Event {
            event_type,
            source_agent,
            target_agents: self.target_agents,
            timestamp,
            data: self.data,
            simulation_context: self.simulation_context,
            processed_at: None,
            processed_ts: None,
        })
    }
}
