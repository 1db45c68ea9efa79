//! Subscriber side of a hub registration

use tokio::sync::mpsc;

use super::Payload;

/// Hub-assigned client identifier
pub type ClientId = u64;

/// A registered client's outbound stream.
///
/// `recv` yields queued payloads in broadcast order and returns `None` once the
/// hub has unregistered the client and the queue is drained.
pub struct Subscription {
    id: ClientId,
    inbound: mpsc::Receiver<Payload>,
}

impl Subscription {
    pub(crate) fn new(id: ClientId, inbound: mpsc::Receiver<Payload>) -> Self {
        Self { id, inbound }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Payload> {
        self.inbound.recv().await
    }
}
