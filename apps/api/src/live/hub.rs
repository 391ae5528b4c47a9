use tokio::sync::broadcast;
use tracing::debug;

use crate::notifications::PushEnvelope;

/// Largest broadcast buffer the hub will allocate.
pub const MAX_CAPACITY: usize = 1 << 16;

/// In-process fan-out of push envelopes to every connected live-update socket.
#[derive(Clone)]
pub struct PushHub {
    tx: broadcast::Sender<PushEnvelope>,
}

impl PushHub {
    /// `capacity` is clamped to `1..=MAX_CAPACITY`.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.clamp(1, MAX_CAPACITY));
        Self { tx }
    }

    /// Returns how many subscribers the envelope reached. Zero is not an error.
    pub fn publish(&self, envelope: PushEnvelope) -> usize {
        match self.tx.send(envelope) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("No live-update subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
