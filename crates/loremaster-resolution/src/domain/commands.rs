//! Commands for the Resolution context.

use loremaster_core::command::Command;
use uuid::Uuid;

/// Command to open a new scene in a campaign.
#[derive(Debug, Clone)]
pub struct CreateScene {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The new scene's identifier.
    pub scene_id: Uuid,
    /// The owning campaign.
    pub campaign_id: Uuid,
    /// Participating characters.
    pub participants: Vec<Uuid>,
    /// The GM's framing text.
    pub intro_text: String,
}

impl Command for CreateScene {
    fn command_type(&self) -> &'static str {
        "resolution.create_scene"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to force a scene closed without narration.
#[derive(Debug, Clone)]
pub struct EndScene {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The scene identifier.
    pub scene_id: Uuid,
}

impl Command for EndScene {
    fn command_type(&self) -> &'static str {
        "resolution.end_scene"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to resolve a scene through the narrator.
#[derive(Debug, Clone)]
pub struct ResolveScene {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The scene identifier.
    pub scene_id: Uuid,
}

impl Command for ResolveScene {
    fn command_type(&self) -> &'static str {
        "resolution.resolve_scene"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to roll 2d6 for a character.
#[derive(Debug, Clone)]
pub struct RollDice {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The new roll's identifier.
    pub roll_id: Uuid,
    /// The rolling character.
    pub character_id: Uuid,
    /// The scene the roll belongs to, if any.
    pub scene_id: Option<Uuid>,
    /// Stat key as supplied by the client; unknown keys roll at +0.
    pub stat: Option<String>,
    /// Help and interfere bonuses, summed into the situational modifier.
    pub situational_modifiers: Vec<i32>,
    /// The move being rolled for.
    pub move_id: Option<String>,
    /// Hide the roll from other players.
    pub is_secret: bool,
}

impl RollDice {
    /// The summed situational modifier.
    #[must_use]
    pub fn situational_modifier(&self) -> i32 {
        self.situational_modifiers
            .iter()
            .fold(0_i32, |sum, bonus| sum.saturating_add(*bonus))
    }
}

impl Command for RollDice {
    fn command_type(&self) -> &'static str {
        "resolution.roll_dice"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
