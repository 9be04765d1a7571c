//! Domain events for the Character context.

use std::collections::BTreeMap;

use loremaster_core::event::{DomainEvent, EventMetadata};
use loremaster_rules::domain::dice::StatBlock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emitted when a character is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterCreated {
    /// The character identifier.
    pub character_id: Uuid,
    /// The campaign the character plays in.
    pub campaign_id: Uuid,
    /// The owning user.
    pub user_id: Uuid,
    /// The character's name.
    pub name: String,
    /// The clamped stat block.
    pub stats: StatBlock,
}

/// Emitted when a roll uses up the character's forward hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardConsumed {
    /// The character identifier.
    pub character_id: Uuid,
    /// The roll that consumed the hold.
    pub roll_id: Uuid,
    /// The hold value that was consumed.
    pub amount: i32,
}

/// Emitted when the GM grants forward and/or ongoing holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldGranted {
    /// The character identifier.
    pub character_id: Uuid,
    /// Added to the forward hold.
    pub forward: i32,
    /// Added to the ongoing hold.
    pub ongoing: i32,
}

/// Emitted when the ongoing hold is explicitly removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OngoingCleared {
    /// The character identifier.
    pub character_id: Uuid,
    /// The ongoing value that was removed.
    pub previous: i32,
}

/// Emitted when a scene resolution changes the character. Carries resulting
/// values, already clamped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionDeltasApplied {
    /// The character identifier.
    pub character_id: Uuid,
    /// The scene whose resolution produced the change.
    pub scene_id: Uuid,
    /// Harm after the change.
    pub harm: i32,
    /// Conditions gained.
    pub conditions_added: Vec<String>,
    /// Conditions lost.
    pub conditions_removed: Vec<String>,
    /// Relationship scores after the change, for every relationship touched.
    pub relationships: BTreeMap<String, i32>,
}

/// Event payload variants for the Character context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CharacterEventKind {
    /// A character has been created.
    CharacterCreated(CharacterCreated),
    /// A forward hold has been consumed by a roll.
    ForwardConsumed(ForwardConsumed),
    /// Holds have been granted.
    HoldGranted(HoldGranted),
    /// The ongoing hold has been removed.
    OngoingCleared(OngoingCleared),
    /// Resolution deltas have been applied.
    ResolutionDeltasApplied(ResolutionDeltasApplied),
}

/// Domain event envelope for the Character context.
#[derive(Debug, Clone)]
pub struct CharacterEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: CharacterEventKind,
}

impl CharacterEventKind {
    /// Returns the stored event type name of this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CharacterCreated(_) => "character.created",
            Self::ForwardConsumed(_) => "character.forward_consumed",
            Self::HoldGranted(_) => "character.hold_granted",
            Self::OngoingCleared(_) => "character.ongoing_cleared",
            Self::ResolutionDeltasApplied(_) => "character.deltas_applied",
        }
    }
}

impl DomainEvent for CharacterEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("CharacterEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
