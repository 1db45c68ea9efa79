//! Bounded intake queue with admission control

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::types::Event;

/// Default number of intake slots
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Why an event was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("too many events")]
    QueueFull,

    #[error("intake queue is closed")]
    Closed,
}

/// Producer side. Cheap to clone; `submit` never waits.
#[derive(Clone)]
pub struct IntakeQueue {
    tx: mpsc::Sender<Event>,
    closed: CancellationToken,
    capacity: usize,
}

/// Consumer side, owned by the pipeline
pub struct IntakeReceiver {
    rx: mpsc::Receiver<Event>,
    closed: CancellationToken,
    draining: bool,
}

/// Create a queue with `capacity` slots
pub fn intake_queue(capacity: usize) -> (IntakeQueue, IntakeReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let closed = CancellationToken::new();

    (
        IntakeQueue {
            tx,
            closed: closed.clone(),
            capacity,
        },
        IntakeReceiver {
            rx,
            closed,
            draining: false,
        },
    )
}

impl IntakeQueue {
    /// Enqueue if a slot is free, otherwise reject immediately
    pub fn submit(&self, event: Event) -> Result<(), SubmitError> {
        if self.closed.is_cancelled() {
            return Err(SubmitError::Closed);
        }

        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => SubmitError::QueueFull,
            TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    /// Stop admitting events. Already-queued events are still delivered.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Events waiting to be processed
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl IntakeReceiver {
    /// Next event in arrival order.
    ///
    /// After the queue is closed this keeps returning queued events and
    /// yields `None` only once they are exhausted.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            if self.draining {
                return self.rx.recv().await;
            }

            tokio::select! {
                biased;
                event = self.rx.recv() => return event,
                _ = self.closed.cancelled() => {
                    // Refuse new sends; buffered events stay receivable
                    self.rx.close();
                    self.draining = true;
                }
            }
        }
    }

    /// Token cancelled when the queue closes
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceAgent;
    use chrono::Utc;

    fn event(n: usize) -> Event {
        Event::new(format!("e{}", n), SourceAgent::new("a1"), Utc::now())
    }

    #[tokio::test]
    async fn test_excess_is_rejected_and_accepted_are_kept() {
        let (queue, mut rx) = intake_queue(3);

        let results: Vec<_> = (0..5).map(|n| queue.submit(event(n))).collect();
        assert_eq!(results[..3], [Ok(()), Ok(()), Ok(())]);
        assert_eq!(
            results[3..],
            [Err(SubmitError::QueueFull), Err(SubmitError::QueueFull)]
        );
        assert_eq!(queue.len(), 3);

        queue.close();
        let mut received = Vec::new();
        while let Some(e) = rx.recv().await {
            received.push(e.event_type);
        }
        assert_eq!(received, vec!["e0", "e1", "e2"]);
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_but_drains() {
        let (queue, mut rx) = intake_queue(10);
        queue.submit(event(0)).unwrap();
        queue.close();

        assert_eq!(queue.submit(event(1)), Err(SubmitError::Closed));
        assert_eq!(rx.recv().await.unwrap().event_type, "e0");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_slot_frees_after_receive() {
        let (queue, mut rx) = intake_queue(1);
        queue.submit(event(0)).unwrap();
        assert_eq!(queue.submit(event(1)), Err(SubmitError::QueueFull));

        rx.recv().await.unwrap();
        assert!(queue.submit(event(2)).is_ok());
    }
}
