//! Domain events for the Scene context.

use chrono::{DateTime, Utc};
use loremaster_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ledger::{PlayerAction, RollSummary, SceneStatus};

/// Emitted when a scene is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneCreated {
    /// The scene identifier.
    pub scene_id: Uuid,
    /// The owning campaign.
    pub campaign_id: Uuid,
    /// Number within the campaign.
    pub scene_number: u32,
    /// Participating characters, in the order given.
    pub participants: Vec<Uuid>,
    /// The GM's framing text.
    pub intro_text: String,
}

/// Emitted when a player adds to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSubmitted {
    /// The new ledger entry.
    pub action: PlayerAction,
}

/// Emitted when a roll is made in the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollAttached {
    /// The roll as the narrator will see it.
    pub roll: RollSummary,
}

/// Emitted by the first resolution attempt (`AwaitingActions → Resolving`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionBegan {
    /// Always 1.
    pub attempt: u32,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
}

/// Emitted when a failed or abandoned attempt is retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionRetried {
    /// The new attempt number.
    pub attempt: u32,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// Whether the previous attempt was still marked in flight (stale).
    pub superseded_in_flight: bool,
}

/// Emitted when the narrator fails; the scene stays `Resolving`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationFailed {
    /// The failed attempt.
    pub attempt: u32,
    /// What went wrong.
    pub reason: String,
}

/// Emitted when narration succeeds (`Resolving → Resolved`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionCompleted {
    /// The attempt that produced the narration.
    pub attempt: u32,
    /// The narrator's prose.
    pub resolution_text: String,
    /// Ledger entries marked resolved.
    pub resolved_action_ids: Vec<Uuid>,
}

/// Emitted when an admin force-closes the scene without narration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneEndedByAdmin {
    /// The admin who ended the scene.
    pub ended_by: Uuid,
    /// The status the scene was in.
    pub previous_status: SceneStatus,
}

/// Emitted when a turn tracker starts for the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerAttached {
    /// The tracker identifier.
    pub tracker_id: Uuid,
}

/// Emitted when the scene's tracker ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerDetached {
    /// The tracker identifier.
    pub tracker_id: Uuid,
}

/// Event payload variants for the Scene context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SceneEventKind {
    /// The scene was created.
    SceneCreated(SceneCreated),
    /// An action was submitted.
    ActionSubmitted(ActionSubmitted),
    /// A roll was made in the scene.
    RollAttached(RollAttached),
    /// Resolution began.
    ResolutionBegan(ResolutionBegan),
    /// Resolution was retried.
    ResolutionRetried(ResolutionRetried),
    /// The narrator failed.
    NarrationFailed(NarrationFailed),
    /// Resolution completed.
    ResolutionCompleted(ResolutionCompleted),
    /// An admin ended the scene.
    SceneEndedByAdmin(SceneEndedByAdmin),
    /// A turn tracker was attached.
    TrackerAttached(TrackerAttached),
    /// The turn tracker was detached.
    TrackerDetached(TrackerDetached),
}

impl SceneEventKind {
    /// Returns the stored event type name of this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SceneCreated(_) => "scene.scene_created",
            Self::ActionSubmitted(_) => "scene.action_submitted",
            Self::RollAttached(_) => "scene.roll_attached",
            Self::ResolutionBegan(_) => "scene.resolution_began",
            Self::ResolutionRetried(_) => "scene.resolution_retried",
            Self::NarrationFailed(_) => "scene.narration_failed",
            Self::ResolutionCompleted(_) => "scene.resolution_completed",
            Self::SceneEndedByAdmin(_) => "scene.scene_ended_by_admin",
            Self::TrackerAttached(_) => "scene.tracker_attached",
            Self::TrackerDetached(_) => "scene.tracker_detached",
        }
    }
}

/// Domain event envelope for the Scene context.
#[derive(Debug, Clone)]
pub struct SceneEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: SceneEventKind,
}

impl DomainEvent for SceneEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("SceneEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
