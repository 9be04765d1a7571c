//! Route modules organized by bounded context.

pub mod campaigns;
pub mod characters;
pub mod health;
pub mod rules;
pub mod scenes;
pub mod turn_order;

use loremaster_core::command::CommandOutcome;
use serde::Serialize;
use uuid::Uuid;

/// Response body returned after a command is successfully handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// The aggregate the command addressed.
    pub aggregate_id: Uuid,
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

impl From<CommandOutcome> for CommandResponse {
    fn from(outcome: CommandOutcome) -> Self {
        Self {
            aggregate_id: outcome.aggregate_id,
            event_ids: outcome.event_ids(),
        }
    }
}
