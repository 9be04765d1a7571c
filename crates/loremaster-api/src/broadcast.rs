//! In-process real-time fan-out.

use loremaster_core::broadcast::{BroadcastEvent, Broadcaster};
use tokio::sync::broadcast;

/// Fans events out to every subscriber through a `tokio` broadcast channel.
///
/// Transports (websocket or SSE sessions) subscribe and filter by
/// `BroadcastEvent::audience` before forwarding to their user.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<BroadcastEvent>,
}

impl BroadcastHub {
    /// Creates a hub that buffers up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Opens a new subscription. Only events published afterwards are seen.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.sender.subscribe()
    }
}

impl Broadcaster for BroadcastHub {
    fn publish(&self, event: BroadcastEvent) {
        let kind = event.kind.as_str();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(kind, receivers, "broadcast published"),
            Err(_) => tracing::trace!(kind, "broadcast dropped, no subscribers"),
        }
    }
}
