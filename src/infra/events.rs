//! In-process broadcast channels for content events and deployment signals.
//!
//! Both are thin wrappers over `tokio::sync::broadcast`. A multi-process
//! deployment replaces [`LocalSignalBus`] with a bus backed by its shared
//! event transport; everything above the [`SignalBus`] trait stays the same.

use tokio::sync::broadcast;
use tracing::debug;

use crate::application::events::{
    ContentEvent, ContentEventSource, SignalBus, SignalError, TranslationsChanged,
};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fan-out of content mutations raised by the store in this process.
#[derive(Debug)]
pub struct ContentEventHub {
    sender: broadcast::Sender<ContentEvent>,
}

impl ContentEventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver `event` to every subscriber; returns how many received it.
    pub fn publish(&self, event: ContentEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                debug!(event_id = %event.id, "Content event dropped; no subscribers");
                0
            }
        }
    }
}

impl Default for ContentEventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ContentEventSource for ContentEventHub {
    fn subscribe(&self) -> broadcast::Receiver<ContentEvent> {
        self.sender.subscribe()
    }
}

/// Signal bus shared by coordinators living in the same process.
#[derive(Debug)]
pub struct LocalSignalBus {
    sender: broadcast::Sender<TranslationsChanged>,
}

impl LocalSignalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }
}

impl Default for LocalSignalBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl SignalBus for LocalSignalBus {
    fn subscribe(&self) -> broadcast::Receiver<TranslationsChanged> {
        self.sender.subscribe()
    }

    fn publish(&self, signal: TranslationsChanged) -> Result<(), SignalError> {
        self.sender
            .send(signal)
            .map(|_| ())
            .map_err(|_| SignalError::NoSubscribers)
    }
}
