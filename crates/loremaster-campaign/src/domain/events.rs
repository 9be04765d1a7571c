//! Domain events for the Campaign context.

use loremaster_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emitted when a scene takes the campaign's live slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneOpened {
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// The new scene.
    pub scene_id: Uuid,
    /// Monotonic per campaign, starting at 1.
    pub scene_number: u32,
    /// Characters taking part.
    pub participants: Vec<Uuid>,
}

/// Emitted when the live scene is resolved or ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneClosed {
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// The scene leaving the live slot.
    pub scene_id: Uuid,
}

/// Emitted when a resolution starts a new progress clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockStarted {
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// The clock name.
    pub name: String,
    /// Normalized segment count.
    pub segments: u8,
}

/// Emitted when a resolution moves a progress clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockAdvanced {
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// The clock name.
    pub name: String,
    /// Fill after the change.
    pub filled: u8,
}

/// Event payload variants for the Campaign context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CampaignEventKind {
    /// A scene took the live slot.
    SceneOpened(SceneOpened),
    /// The live scene left the slot.
    SceneClosed(SceneClosed),
    /// A clock was started.
    ClockStarted(ClockStarted),
    /// A clock was moved.
    ClockAdvanced(ClockAdvanced),
}

impl CampaignEventKind {
    /// Returns the stored event type name of this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SceneOpened(_) => "campaign.scene_opened",
            Self::SceneClosed(_) => "campaign.scene_closed",
            Self::ClockStarted(_) => "campaign.clock_started",
            Self::ClockAdvanced(_) => "campaign.clock_advanced",
        }
    }
}

/// Domain event envelope for the Campaign context.
#[derive(Debug, Clone)]
pub struct CampaignEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: CampaignEventKind,
}

impl DomainEvent for CampaignEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("CampaignEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
