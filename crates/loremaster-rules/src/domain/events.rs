//! Domain events for the Dice Resolution context.

use loremaster_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dice::{ModifierBreakdown, Outcome, Stat};

/// Emitted once when a roll is made. Rolls are immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiceRolled {
    /// The roll identifier.
    pub roll_id: Uuid,
    /// The campaign the roll belongs to.
    pub campaign_id: Uuid,
    /// The scene the roll was made in, if any.
    pub scene_id: Option<Uuid>,
    /// The rolling character.
    pub character_id: Uuid,
    /// The user who made the roll.
    pub user_id: Uuid,
    /// The stat rolled, if any.
    pub stat: Option<Stat>,
    /// The move being rolled for, if any.
    pub move_id: Option<String>,
    /// The two die faces.
    pub dice: [u8; 2],
    /// Where the modifier came from.
    pub breakdown: ModifierBreakdown,
    /// The summed modifier.
    pub modifier: i32,
    /// `dice[0] + dice[1] + modifier`.
    pub total: i32,
    /// The outcome tier.
    pub outcome: Outcome,
    /// Secret rolls are only ever shown to their roller (and the GM).
    pub is_secret: bool,
}

/// Event payload variants for the Dice Resolution context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RulesEventKind {
    /// A roll has been made.
    DiceRolled(DiceRolled),
}

/// Domain event envelope for the Dice Resolution context.
#[derive(Debug, Clone)]
pub struct RulesEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: RulesEventKind,
}

impl DomainEvent for RulesEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            RulesEventKind::DiceRolled(_) => "rules.dice_rolled",
        }
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("RulesEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
