//! Command abstractions.

use uuid::Uuid;

use crate::repository::StoredEvent;

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;
}

/// Result of a successfully handled command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// The aggregate the command was addressed to (or created).
    pub aggregate_id: Uuid,
    /// Every event persisted by the command, across all streams it touched.
    pub stored_events: Vec<StoredEvent>,
}

impl CommandOutcome {
    /// Returns the ids of the persisted events.
    #[must_use]
    pub fn event_ids(&self) -> Vec<Uuid> {
        self.stored_events.iter().map(|e| e.event_id).collect()
    }
}
