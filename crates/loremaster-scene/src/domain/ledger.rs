//! Value types carried by the scene stream.

use chrono::{DateTime, Utc};
use loremaster_rules::domain::dice::{Outcome, Stat};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest accepted action text, in characters.
pub const MAX_ACTION_TEXT_CHARS: usize = 4000;

/// Scene lifecycle. Transitions only move forward; `Resolved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SceneStatus {
    /// Players may submit actions.
    AwaitingActions,
    /// The narrator is (or was last) working on the scene.
    Resolving,
    /// The scene is closed.
    Resolved,
}

impl SceneStatus {
    /// Whether the scene still holds its campaign's live slot.
    #[must_use]
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Resolved)
    }

    /// Returns the wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingActions => "AWAITING_ACTIONS",
            Self::Resolving => "RESOLVING",
            Self::Resolved => "RESOLVED",
        }
    }
}

/// Status of one ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    /// Waiting for the scene to resolve.
    Pending,
    /// Consumed by a resolution.
    Resolved,
}

/// One entry in the scene's action ledger. The text never changes after
/// submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAction {
    /// The action identifier.
    pub action_id: Uuid,
    /// The scene the action belongs to.
    pub scene_id: Uuid,
    /// The acting character.
    pub character_id: Uuid,
    /// The submitting user.
    pub user_id: Uuid,
    /// What the character does.
    pub action_text: String,
    /// Ledger status.
    pub status: ActionStatus,
    /// A roll backing the action, if any.
    pub attached_roll_id: Option<Uuid>,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
}

/// A roll made in the scene, as the narrator sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollSummary {
    /// The roll identifier.
    pub roll_id: Uuid,
    /// The rolling character.
    pub character_id: Uuid,
    /// The rolling user.
    pub user_id: Uuid,
    /// The stat rolled, if any.
    pub stat: Option<Stat>,
    /// The move rolled for, if any.
    pub move_id: Option<String>,
    /// The two die faces.
    pub dice: [u8; 2],
    /// The summed modifier.
    pub modifier: i32,
    /// Dice plus modifier.
    pub total: i32,
    /// The outcome tier.
    pub outcome: Outcome,
    /// Whether the roll is hidden from other players.
    pub is_secret: bool,
}

impl RollSummary {
    /// Whether `user_id` may see this roll.
    #[must_use]
    pub fn visible_to(&self, user_id: Uuid, is_admin: bool) -> bool {
        !self.is_secret || is_admin || self.user_id == user_id
    }
}

/// Tracks the current resolution attempt so retries after a narrator
/// failure can be told apart from concurrent resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionAttempt {
    /// 1-based attempt counter.
    pub attempt: u32,
    /// Whether a narrator call for this attempt may still be running.
    pub in_flight: bool,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
}

/// How a resolved scene was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedBy {
    /// The narrator resolved it.
    Narration,
    /// An admin ended it without narration.
    AdminOverride,
}
