//! Data types for the audit stream service
//!
//! This module contains the event model shared by every pipeline stage and adapter.

mod event;
mod page;

pub use event::{
    Event, EventData, EventSubmission, SourceAgent, TargetAgent, ValidationError,
};
pub use page::{AgentStats, EventPage};
