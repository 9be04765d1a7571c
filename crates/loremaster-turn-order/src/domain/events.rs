//! Domain events for the Turn Order context.

use loremaster_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One slot in the initiative order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOrderEntry {
    /// The character taking the turn.
    pub character_id: Uuid,
    /// Initiative score; higher goes first.
    pub initiative: i32,
    /// Whether the character has acted this round.
    pub has_acted: bool,
}

/// Why the turn pointer moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdvanceCause {
    /// The current character ended their turn.
    TurnEnded {
        /// Whether an admin ended it on their behalf.
        by_admin: bool,
    },
    /// An admin moved to the next turn.
    AdminAdvance,
    /// An admin skipped the current character.
    Skipped {
        /// Audit note.
        reason: String,
    },
}

/// Emitted when the tracker starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOrderStarted {
    /// The tracker identifier.
    pub tracker_id: Uuid,
    /// The owning campaign.
    pub campaign_id: Uuid,
    /// The scene the tracker is layered on.
    pub scene_id: Uuid,
    /// Initiative order, already sorted.
    pub order: Vec<TurnOrderEntry>,
}

/// Emitted whenever the turn pointer moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnAdvanced {
    /// The character whose turn ended.
    pub from_character_id: Uuid,
    /// Why the pointer moved.
    pub cause: AdvanceCause,
    /// Pointer after the move.
    pub current_turn_index: usize,
    /// Round after the move.
    pub round_number: u32,
    /// Whether the move started a new round.
    pub new_round: bool,
}

/// Emitted when the tracker ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOrderEnded {
    /// The round the tracker ended in.
    pub final_round: u32,
}

/// Event payload variants for the Turn Order context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TurnOrderEventKind {
    /// The tracker started.
    TurnOrderStarted(TurnOrderStarted),
    /// The turn pointer moved.
    TurnAdvanced(TurnAdvanced),
    /// The tracker ended.
    TurnOrderEnded(TurnOrderEnded),
}

impl TurnOrderEventKind {
    /// Returns the stored event type name of this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TurnOrderStarted(_) => "turn_order.started",
            Self::TurnAdvanced(_) => "turn_order.advanced",
            Self::TurnOrderEnded(_) => "turn_order.ended",
        }
    }
}

/// Domain event envelope for the Turn Order context.
#[derive(Debug, Clone)]
pub struct TurnOrderEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: TurnOrderEventKind,
}

impl DomainEvent for TurnOrderEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("TurnOrderEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
