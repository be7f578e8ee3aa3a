//! Dispatcher signal bus
//!
//! In-process publish/subscribe keyed by string topic. Integrations use it
//! to broadcast records like "a new device appeared" to whichever platform
//! cares, without either side knowing about the other.

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default channel capacity per signal
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// String-topic pub/sub bus carrying JSON payloads
pub struct Dispatcher {
    channels: DashMap<String, broadcast::Sender<serde_json::Value>>,
    capacity: usize,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to a signal
    ///
    /// Dropping the receiver disconnects; there is no explicit unsubscribe.
    pub fn connect(&self, signal: &str) -> broadcast::Receiver<serde_json::Value> {
        trace!(signal, "Connecting to dispatcher signal");
        self.sender(signal).subscribe()
    }

    /// Subscribe to a signal, decoding payloads into `T`
    pub fn connect_typed<T: serde::de::DeserializeOwned>(
        &self,
        signal: &str,
    ) -> TypedSignalReceiver<T> {
        TypedSignalReceiver::new(self.connect(signal))
    }

    /// Send a payload to all subscribers of a signal
    ///
    /// Returns the number of receivers the payload was delivered to. Sending
    /// with no subscribers is fine; the payload is dropped.
    pub fn send(&self, signal: &str, payload: serde_json::Value) -> usize {
        debug!(signal, "Dispatching signal");
        self.sender(signal).send(payload).unwrap_or(0)
    }

    /// Send a serializable record to all subscribers of a signal
    pub fn send_typed<T: serde::Serialize>(&self, signal: &str, data: &T) -> usize {
        match serde_json::to_value(data) {
            Ok(payload) => self.send(signal, payload),
            Err(err) => {
                tracing::warn!(signal, %err, "Dropping unserializable dispatch payload");
                0
            }
        }
    }

    fn sender(&self, signal: &str) -> broadcast::Sender<serde_json::Value> {
        self.channels
            .entry(signal.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver that decodes signal payloads into a concrete type
///
/// Payloads that fail to decode are skipped, matching the swallow-and-move-on
/// error posture of dispatcher handlers.
pub struct TypedSignalReceiver<T> {
    rx: broadcast::Receiver<serde_json::Value>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: serde::de::DeserializeOwned> TypedSignalReceiver<T> {
    fn new(rx: broadcast::Receiver<serde_json::Value>) -> Self {
        Self {
            rx,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Receive the next decodable payload
    pub async fn recv(&mut self) -> Result<T, broadcast::error::RecvError> {
        loop {
            let payload = self.rx.recv().await?;
            if let Ok(data) = serde_json::from_value::<T>(payload) {
                return Ok(data);
            }
        }
    }
}
