//! Translation between [`Event`] and the flat `events` table row.
//!
//! Nested descriptors and opaque payloads become JSON columns; the well-known
//! `data` keys are also copied into their own columns for filtering.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::StorageResult;
use crate::types::{Event, EventData, SourceAgent, TargetAgent};

/// One row of the `events` table
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    /// Surrogate key, assigned on insert (0 before)
    pub id: i64,
    pub created_at: Option<DateTime<Utc>>,

    pub event_type: String,
    pub timestamp: Option<DateTime<Utc>>,

    pub source_agent_id: String,
    pub source_agent_name: String,
    pub source_agent_mood: Option<Value>,
    pub source_agent_relationships: Option<Value>,
    pub source_agent_activity: Option<Value>,
    pub source_agent_plan: Option<Value>,
    pub source_agent_extra: Option<Value>,

    pub target_agents: Option<Value>,

    pub message: Option<String>,
    pub tick: Option<i64>,
    pub is_initiative: Option<bool>,
    pub action_result: Option<String>,
    pub event_data: Option<Value>,

    pub simulation_context: Option<Value>,

    pub processed_at: DateTime<Utc>,
    pub processed_ts: i64,
}

fn non_empty(map: &Map<String, Value>) -> Option<Value> {
    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map.clone()))
    }
}

impl EventRow {
    /// Build the row for an enriched event.
    ///
    /// An event that somehow reaches storage unenriched is stamped with the
    /// current time, as the table requires a processing instant.
    pub fn from_event(event: &Event) -> StorageResult<Self> {
        let processed_at = event.processed_at.unwrap_or_else(Utc::now);
        let processed_ts = event.processed_ts.unwrap_or_else(|| processed_at.timestamp());

        let agent = &event.source_agent;
        let target_agents = match &event.target_agents {
            Some(targets) => Some(serde_json::to_value(targets)?),
            None => None,
        };
        let event_data = match &event.data {
            Some(data) => Some(serde_json::to_value(data)?),
            None => None,
        };
        let data = event.data.as_ref();

        Ok(Self {
            id: 0,
            created_at: None,
            event_type: event.event_type.clone(),
            timestamp: Some(event.timestamp),
            source_agent_id: agent.agent_id.clone(),
            source_agent_name: agent.name.clone(),
            source_agent_mood: agent.mood.clone(),
            source_agent_relationships: agent.relationships.clone(),
            source_agent_activity: agent.activity.clone(),
            source_agent_plan: agent.plan.clone(),
            source_agent_extra: non_empty(&agent.extra),
            target_agents,
            message: data.and_then(|d| d.message.clone()),
            tick: data.and_then(|d| d.tick),
            is_initiative: data.and_then(|d| d.is_initiative),
            action_result: data.and_then(|d| d.action_result.clone()),
            event_data,
            simulation_context: event.simulation_context.clone(),
            processed_at,
            processed_ts,
        })
    }

    /// Rebuild the event. Undecodable JSON columns are dropped, not fatal.
    pub fn into_event(self) -> Event {
        let extra = match self.source_agent_extra {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let source_agent = SourceAgent {
            agent_id: self.source_agent_id,
            name: self.source_agent_name,
            mood: self.source_agent_mood,
            relationships: self.source_agent_relationships,
            activity: self.source_agent_activity,
            plan: self.source_agent_plan,
            extra,
        };

        let target_agents = self
            .target_agents
            .and_then(|v| serde_json::from_value::<Vec<TargetAgent>>(v).ok());

        let data = match self.event_data {
            Some(v) => serde_json::from_value::<EventData>(v).ok(),
            None if self.message.is_some() || self.tick.is_some() => Some(EventData {
                message: self.message,
                tick: self.tick,
                is_initiative: self.is_initiative,
                action_result: self.action_result,
                extra: Map::new(),
            }),
            None => None,
        };

        Event {
            event_type: self.event_type,
            source_agent,
            target_agents,
            timestamp: self
                .timestamp
                .or(self.created_at)
                .unwrap_or(self.processed_at),
            data,
            simulation_context: self.simulation_context,
            processed_at: Some(self.processed_at),
            processed_ts: Some(self.processed_ts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event() -> Event {
        let t = "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut agent = SourceAgent::new("a1");
        agent.name = "Ada".to_string();
        agent.mood = Some(json!({"happiness": 0.7}));
        agent.extra.insert("race".to_string(), json!({"type": "elf"}));

        let mut data = EventData {
            message: Some("hello".to_string()),
            tick: Some(12),
            is_initiative: Some(true),
            ..Default::default()
        };
        data.extra.insert("sentiments".to_string(), json!({"b2": {"delta": 0.2}}));

        let mut event = Event::new("message_sent", agent, t);
        event.target_agents = Some(vec![TargetAgent {
            agent_id: "b2".to_string(),
            name: "Bo".to_string(),
            extra: Map::new(),
        }]);
        event.data = Some(data);
        event.simulation_context = Some(json!({"phase": "discuss"}));
        event.enriched(t + chrono::Duration::seconds(1))
    }

    #[test]
    fn test_row_flattens_known_fields() {
        let row = EventRow::from_event(&sample_event()).unwrap();
        assert_eq!(row.source_agent_id, "a1");
        assert_eq!(row.message.as_deref(), Some("hello"));
        assert_eq!(row.tick, Some(12));
        assert_eq!(row.is_initiative, Some(true));
        assert_eq!(row.source_agent_extra, Some(json!({"race": {"type": "elf"}})));
        assert_eq!(row.target_agents, Some(json!([{"agent_id": "b2", "name": "Bo"}])));
        assert_eq!(row.event_data.as_ref().unwrap()["sentiments"]["b2"]["delta"], 0.2);
    }

    #[test]
    fn test_row_restores_event() {
        let event = sample_event();
        let restored = EventRow::from_event(&event).unwrap().into_event();
        assert_eq!(restored, event);
    }

    #[test]
    fn test_corrupt_json_column_is_dropped() {
        let mut row = EventRow::from_event(&sample_event()).unwrap();
        row.target_agents = Some(json!("not a list"));
        let restored = row.into_event();
        assert!(restored.target_agents.is_none());
        assert_eq!(restored.source_agent.agent_id, "a1");
    }
}
