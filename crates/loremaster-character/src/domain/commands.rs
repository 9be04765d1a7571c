//! Commands for the Character context.

use std::collections::BTreeMap;

use loremaster_core::command::Command;
use uuid::Uuid;

/// Command to create a character.
#[derive(Debug, Clone)]
pub struct CreateCharacter {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The new character's identifier.
    pub character_id: Uuid,
    /// The campaign the character plays in.
    pub campaign_id: Uuid,
    /// The owning user.
    pub user_id: Uuid,
    /// The character's name.
    pub name: String,
    /// Raw stat values keyed by stat name. Unknown keys are dropped.
    pub stats: BTreeMap<String, i32>,
}

impl Command for CreateCharacter {
    fn command_type(&self) -> &'static str {
        "character.create_character"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to grant forward and/or ongoing holds.
#[derive(Debug, Clone)]
pub struct GrantHold {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The character identifier.
    pub character_id: Uuid,
    /// Added to the forward hold.
    pub forward: i32,
    /// Added to the ongoing hold.
    pub ongoing: i32,
}

impl Command for GrantHold {
    fn command_type(&self) -> &'static str {
        "character.grant_hold"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to remove a character's ongoing hold.
#[derive(Debug, Clone)]
pub struct ClearOngoing {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The character identifier.
    pub character_id: Uuid,
}

impl Command for ClearOngoing {
    fn command_type(&self) -> &'static str {
        "character.clear_ongoing"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
