//! Broadcast hub for live subscribers
//!
//! The hub owns the registry of connected clients. Every change to it goes
//! through one control loop ([`Hub::run`]) fed by three signals: register,
//! unregister and broadcast. Nothing else touches the registry, so it needs
//! no lock.
//!
//! ## Slow consumers
//! Each client gets a bounded outbound channel. Fan-out uses `try_send`;
//! a full channel means the client is not keeping up, and the hub drops it on
//! the spot. Dropping the registry's sender closes the channel, which ends the
//! client's write loop once it has drained what was already queued.
//!
//! Handing a payload to the hub waits for a free signal slot instead. Each
//! loop step is one non-blocking pass over the registry, so that wait never
//! depends on a slow client, and a registered client either receives every
//! payload or is disconnected.

mod client;

pub use client::{ClientId, Subscription};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Serialized event, shared by every client it is sent to
pub type Payload = Arc<str>;

/// Channel sizes for the hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Pending control signals (register/unregister/broadcast)
    pub signal_capacity: usize,
    /// Per-client outbound queue
    pub client_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            signal_capacity: 256,
            client_capacity: 256,
        }
    }
}

enum Signal {
    Register {
        id: ClientId,
        outbound: mpsc::Sender<Payload>,
        ack: oneshot::Sender<()>,
    },
    Unregister(ClientId),
    Broadcast(Payload),
}

/// The hub control loop and its registry
pub struct Hub {
    clients: HashMap<ClientId, mpsc::Sender<Payload>>,
    signals: mpsc::Receiver<Signal>,
    client_count: Arc<AtomicUsize>,
}

/// Cloneable handle for sending signals to the hub
#[derive(Clone)]
pub struct HubHandle {
    signals: mpsc::Sender<Signal>,
    client_count: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
    client_capacity: usize,
}

impl Hub {
    /// Create the hub and its handle without starting the loop
    pub fn new(config: HubConfig) -> (Hub, HubHandle) {
        let (tx, rx) = mpsc::channel(config.signal_capacity.max(1));
        let client_count = Arc::new(AtomicUsize::new(0));

        let hub = Hub {
            clients: HashMap::new(),
            signals: rx,
            client_count: client_count.clone(),
        };
        let handle = HubHandle {
            signals: tx,
            client_count,
            next_id: Arc::new(AtomicU64::new(1)),
            client_capacity: config.client_capacity.max(1),
        };
        (hub, handle)
    }

    /// Create the hub and run its loop on the current runtime
    pub fn spawn(config: HubConfig) -> HubHandle {
        let (hub, handle) = Self::new(config);
        tokio::spawn(hub.run());
        handle
    }

    /// Process signals one at a time until every handle is dropped
    pub async fn run(mut self) {
        info!("Broadcast hub started");

        while let Some(signal) = self.signals.recv().await {
            match signal {
                Signal::Register { id, outbound, ack } => {
                    self.clients.insert(id, outbound);
                    self.publish_count();
                    let _ = ack.send(());
                    info!(client = id, total = self.clients.len(), "Client connected");
                }
                Signal::Unregister(id) => {
                    // Removing drops the only sender, closing the channel
                    if self.clients.remove(&id).is_some() {
                        self.publish_count();
                        info!(client = id, total = self.clients.len(), "Client disconnected");
                    }
                }
                Signal::Broadcast(payload) => self.fan_out(payload),
            }
        }

        self.clients.clear();
        self.publish_count();
        info!("Broadcast hub stopped");
    }

    fn fan_out(&mut self, payload: Payload) {
        if self.clients.is_empty() {
            return;
        }

        let mut dropped = Vec::new();
        for (id, outbound) in &self.clients {
            match outbound.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(client = *id, "Client cannot keep up, disconnecting");
                    dropped.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(client = *id, "Client receiver gone, removing");
                    dropped.push(*id);
                }
            }
        }

        for id in &dropped {
            self.clients.remove(id);
        }
        if !dropped.is_empty() {
            self.publish_count();
        }

        debug!(
            delivered = self.clients.len(),
            dropped = dropped.len(),
            "Broadcast delivered"
        );
    }

    fn publish_count(&self) {
        self.client_count.store(self.clients.len(), Ordering::SeqCst);
    }
}

impl HubHandle {
    /// Register a new client and return its outbound stream.
    ///
    /// Resolves once the hub has added the client, so a broadcast issued
    /// afterwards reaches it. Returns `None` if the hub has stopped.
    pub async fn register(&self) -> Option<Subscription> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (outbound, inbound) = mpsc::channel(self.client_capacity);
        let (ack, acked) = oneshot::channel();

        self.signals
            .send(Signal::Register { id, outbound, ack })
            .await
            .ok()?;
        acked.await.ok()?;

        Some(Subscription::new(id, inbound))
    }

    /// Remove a client. Unknown or already-removed ids are ignored.
    pub async fn unregister(&self, id: ClientId) {
        if self.signals.send(Signal::Unregister(id)).await.is_err() {
            debug!(client = id, "Hub stopped before unregister");
        }
    }

    /// Queue a payload for every registered client.
    ///
    /// Waits while the signal queue is full. Returns false only if the hub
    /// has stopped.
    pub async fn broadcast(&self, payload: impl Into<Payload>) -> bool {
        match self.signals.send(Signal::Broadcast(payload.into())).await {
            Ok(()) => true,
            Err(_) => {
                debug!("Hub stopped, broadcast discarded");
                false
            }
        }
    }

    /// Number of registered clients as of the last processed signal
    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::SeqCst)
    }
}
