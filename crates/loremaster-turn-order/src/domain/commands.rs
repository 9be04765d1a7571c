//! Commands for the Turn Order context.

use loremaster_core::command::Command;
use uuid::Uuid;

use super::aggregates::Initiative;

/// Command to start a turn tracker on a scene.
#[derive(Debug, Clone)]
pub struct StartTurnOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The scene identifier.
    pub scene_id: Uuid,
    /// The new tracker's identifier.
    pub tracker_id: Uuid,
    /// Participants and their initiative, in tie-break order.
    pub participants: Vec<Initiative>,
}

impl Command for StartTurnOrder {
    fn command_type(&self) -> &'static str {
        "turn_order.start"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to end the current character's turn.
#[derive(Debug, Clone)]
pub struct EndTurn {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The scene identifier.
    pub scene_id: Uuid,
    /// The character ending their turn.
    pub character_id: Uuid,
}

impl Command for EndTurn {
    fn command_type(&self) -> &'static str {
        "turn_order.end_turn"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to move to the next turn (admin "Next Turn").
#[derive(Debug, Clone)]
pub struct AdvanceTurn {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The scene identifier.
    pub scene_id: Uuid,
}

impl Command for AdvanceTurn {
    fn command_type(&self) -> &'static str {
        "turn_order.advance"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to skip the current character.
#[derive(Debug, Clone)]
pub struct SkipTurn {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The scene identifier.
    pub scene_id: Uuid,
    /// Audit note.
    pub reason: String,
}

impl Command for SkipTurn {
    fn command_type(&self) -> &'static str {
        "turn_order.skip"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to end a scene's turn tracker.
#[derive(Debug, Clone)]
pub struct EndTurnOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The scene identifier.
    pub scene_id: Uuid,
}

impl Command for EndTurnOrder {
    fn command_type(&self) -> &'static str {
        "turn_order.end"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
