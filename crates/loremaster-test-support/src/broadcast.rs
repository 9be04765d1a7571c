//! Recording broadcaster for asserting on published real-time events.

use std::sync::Mutex;

use loremaster_core::broadcast::{BroadcastEvent, BroadcastKind, Broadcaster};

/// A broadcaster that keeps every published event.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    published: Mutex<Vec<BroadcastEvent>>,
}

impl RecordingBroadcaster {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every published event.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<BroadcastEvent> {
        self.published.lock().unwrap().clone()
    }

    /// Returns the published events of one kind.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published_of(&self, kind: BroadcastKind) -> Vec<BroadcastEvent> {
        self.published()
            .into_iter()
            .filter(|event| event.kind == kind)
            .collect()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn publish(&self, event: BroadcastEvent) {
        self.published.lock().unwrap().push(event);
    }
}
