//! Audit Stream Service
//!
//! Ingests audit events from simulated agents and fans each one out to three
//! sinks: a bounded recency cache, a durable log written in periodic batches,
//! and live WebSocket subscribers.
//!
//! # Features
//!
//! - **Admission control**: a bounded intake queue rejects excess load immediately
//! - **Monotonic enrichment**: every event is stamped with a non-decreasing processing time
//! - **Batched persistence**: one durable write per flush interval
//! - **Slow-consumer eviction**: a subscriber that falls behind is dropped, never waited on
//!
//! # Modules
//!
//! - `types`: Event model and paged read results
//! - `pipeline`: Intake queue, batch accumulator and the ingestion consumer
//! - `hub`: Broadcast hub for live subscribers
//! - `cache`: Recency cache (Redis sorted set or in-memory)
//! - `storage`: Durable log (PostgreSQL or in-memory)
//! - `api`: Axum router, REST handlers, WebSocket handler, JWT auth
//! - `config`: Environment-driven configuration
//! - `utils`: Processing clock and tracing setup
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use audit_stream::cache::MemoryRecencyCache;
//! use audit_stream::hub::{Hub, HubConfig};
//! use audit_stream::pipeline::{intake_queue, Pipeline, PipelineConfig};
//! use audit_stream::storage::MemoryEventLog;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = PipelineConfig::default();
//!     let hub = Hub::spawn(HubConfig::default());
//!     let (queue, intake) = intake_queue(config.queue_capacity);
//!     let pipeline = Pipeline::new(
//!         Arc::new(MemoryRecencyCache::new()),
//!         Arc::new(MemoryEventLog::new()),
//!         hub,
//!         &config,
//!     )
//!     .spawn(intake);
//!
//!     // ... submit events through `queue` ...
//!     drop(queue);
//!     pipeline.shutdown().await;
//! }
//! ```

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod hub;
pub mod pipeline;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::AppConfig;
pub use hub::{Hub, HubConfig, HubHandle};
pub use pipeline::{intake_queue, IntakeQueue, Pipeline, PipelineConfig, PipelineHandle, SubmitError};
pub use types::{AgentStats, Event, EventPage, EventSubmission, SourceAgent, TargetAgent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
