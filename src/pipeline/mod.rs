//! Event ingestion pipeline
//!
//! A single consumer task takes admitted events off the intake queue and, for
//! each one in arrival order:
//!
//! 1. stamps `processed_at` / `processed_ts` and serializes it once
//! 2. saves it to the recency cache (failures logged, never propagated)
//! 3. appends it to the batch buffer
//! 4. hands the serialized form to the hub, if anyone is subscribed
//!
//! ```text
//! ┌────────┐  submit   ┌──────────┐ recv  ┌──────────┐──► RecencyCache
//! │ HTTP   │──────────►│ Intake   │──────►│ Pipeline │──► BatchAccumulator ──(1s)──► DurableLog
//! │ handler│ 202 / 429 │ (bounded)│       │ consumer │──► HubHandle::broadcast
//! └────────┘           └──────────┘       └──────────┘
//! ```
//!
//! Closing the intake queue ends the consumer after the queue drains; the
//! flush timer is then stopped and one last flush writes whatever is left.

mod batch;
mod queue;

pub use batch::{BatchAccumulator, DEFAULT_FLUSH_INTERVAL, MIN_FLUSH_INTERVAL};
pub use queue::{intake_queue, IntakeQueue, IntakeReceiver, SubmitError, DEFAULT_QUEUE_CAPACITY};

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::RecencyCache;
use crate::hub::{HubHandle, Payload};
use crate::storage::DurableLog;
use crate::types::Event;
use crate::utils::ProcessingClock;

/// Pipeline tuning
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub flush_interval: Duration,
    /// Extra attempts for a failed batch write (0 = drop on failure)
    pub flush_retries: u32,
    pub retry_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            flush_retries: 0,
            retry_delay: Duration::from_millis(200),
        }
    }
}

/// The ingestion stage between the intake queue and the three sinks
pub struct Pipeline {
    cache: Arc<dyn RecencyCache>,
    batch: Arc<BatchAccumulator>,
    hub: HubHandle,
    clock: ProcessingClock,
    flush_interval: Duration,
}

impl Pipeline {
    pub fn new(
        cache: Arc<dyn RecencyCache>,
        log: Arc<dyn DurableLog>,
        hub: HubHandle,
        config: &PipelineConfig,
    ) -> Self {
        let batch = BatchAccumulator::new(log)
            .with_retries(config.flush_retries, config.retry_delay);

        Self {
            cache,
            batch: Arc::new(batch),
            hub,
            clock: ProcessingClock::new(),
            flush_interval: config.flush_interval,
        }
    }

    /// Replace the processing clock
    pub fn with_clock(mut self, clock: ProcessingClock) -> Self {
        self.clock = clock;
        self
    }

    /// Run one event through every stage, returning the enriched event
    pub async fn process_event(&self, event: Event) -> Event {
        let event = event.enriched(self.clock.now());

        // Shared by the cache member and every subscriber
        let payload: Option<Payload> = match serde_json::to_string(&event) {
            Ok(json) => Some(json.into()),
            Err(e) => {
                warn!(error = %e, event_type = %event.event_type, "Failed to serialize event");
                None
            }
        };

        if let Some(payload) = &payload {
            if let Err(e) = self.cache.save_serialized(&event, payload).await {
                warn!(error = %e, event_type = %event.event_type, "Failed to save event to recency cache");
            }
        }

        let buffered = self.batch.append(event.clone());

        if let Some(payload) = payload {
            if self.hub.client_count() > 0 {
                self.hub.broadcast(payload).await;
            }
        }

        debug!(event_type = %event.event_type, buffered, "Event processed");
        event
    }

    /// Consume the intake until it is closed and drained, then flush.
    pub async fn run(self, mut intake: IntakeReceiver) {
        info!("Event processor started");

        let stop_timer = CancellationToken::new();
        let timer = self.batch.spawn_timer(self.flush_interval, stop_timer.clone());

        while let Some(event) = intake.recv().await {
            self.process_event(event).await;
        }

        stop_timer.cancel();
        if let Err(e) = timer.await {
            warn!(error = %e, "Batch timer task ended abnormally");
        }

        let flushed = self.batch.flush().await;
        info!(flushed, "Event processor stopped");
    }

    /// Start the consumer on the current runtime
    pub fn spawn(self, intake: IntakeReceiver) -> PipelineHandle {
        let close = intake.close_token();
        let task = tokio::spawn(self.run(intake));
        PipelineHandle { close, task }
    }
}

/// Owner's handle to a running pipeline
pub struct PipelineHandle {
    close: CancellationToken,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    /// Close the intake, wait for the drain and the final flush
    pub async fn shutdown(self) {
        self.close.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Pipeline task ended abnormally");
        }
    }
}
