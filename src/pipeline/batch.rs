//! Batch accumulator for durable writes
//!
//! Processed events are appended to an in-memory buffer; a timer swaps the
//! buffer out and writes it to the durable log as one batch. The lock is held
//! only for the append or the swap, never across the write.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::storage::DurableLog;
use crate::types::Event;

/// Default flush interval
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest period the timer will run with
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Collects events between flushes
pub struct BatchAccumulator {
    buffer: Mutex<Vec<Event>>,
    log: Arc<dyn DurableLog>,
    /// Extra attempts for a failed batch; 0 drops it on first failure
    retry_budget: u32,
    retry_delay: Duration,
}

impl BatchAccumulator {
    /// Create an accumulator that drops failed batches
    pub fn new(log: Arc<dyn DurableLog>) -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(100)),
            log,
            retry_budget: 0,
            retry_delay: Duration::from_millis(100),
        }
    }

    /// Retry a failed batch up to `budget` more times, `delay` apart
    pub fn with_retries(mut self, budget: u32, delay: Duration) -> Self {
        self.retry_budget = budget;
        self.retry_delay = delay;
        self
    }

    /// Append an event, returning the buffer size after the append
    pub fn append(&self, event: Event) -> usize {
        let mut buffer = self.buffer.lock();
        buffer.push(event);
        buffer.len()
    }

    /// Events waiting for the next flush
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.buffer.lock())
    }

    /// Swap out the buffer and write it as one batch.
    ///
    /// Returns the number of events written. A batch that still fails after
    /// the retry budget is logged and dropped; it is never put back.
    pub async fn flush(&self) -> usize {
        let batch = self.take();
        if batch.is_empty() {
            return 0;
        }

        debug!(events = batch.len(), "Flushing batch");

        let mut attempt = 0;
        loop {
            match self.log.batch_insert(&batch).await {
                Ok(rows) => {
                    debug!(rows, "Batch written");
                    return batch.len();
                }
                Err(e) if attempt < self.retry_budget => {
                    attempt += 1;
                    warn!(
                        error = %e,
                        attempt,
                        budget = self.retry_budget,
                        "Batch write failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    error!(error = %e, dropped = batch.len(), "Batch write failed, dropping batch");
                    return 0;
                }
            }
        }
    }

    /// Flush every `period` until `stop` is cancelled.
    ///
    /// The first flush happens one period after the call. A flush already in
    /// progress when `stop` fires runs to completion. Periods below
    /// [`MIN_FLUSH_INTERVAL`] are raised to it.
    pub fn spawn_timer(self: &Arc<Self>, period: Duration, stop: CancellationToken) -> JoinHandle<()> {
        let batch = Arc::clone(self);
        let period = period.max(MIN_FLUSH_INTERVAL);
        tokio::spawn(async move {
            info!(interval_ms = period.as_millis() as u64, "Batch inserter started");

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        batch.flush().await;
                    }
                }
            }

            info!("Batch inserter stopped");
        })
    }
}
