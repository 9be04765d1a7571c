//! Commands for the Scene context.

use loremaster_core::command::Command;
use uuid::Uuid;

/// Command to add an action to a scene's ledger.
#[derive(Debug, Clone)]
pub struct SubmitAction {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The scene identifier.
    pub scene_id: Uuid,
    /// The new action's identifier.
    pub action_id: Uuid,
    /// The acting character.
    pub character_id: Uuid,
    /// What the character does.
    pub action_text: String,
    /// A roll backing the action, if any.
    pub attached_roll_id: Option<Uuid>,
}

impl Command for SubmitAction {
    fn command_type(&self) -> &'static str {
        "scene.submit_action"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to start resolving a scene.
#[derive(Debug, Clone)]
pub struct BeginResolution {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The scene identifier.
    pub scene_id: Uuid,
}

impl Command for BeginResolution {
    fn command_type(&self) -> &'static str {
        "scene.begin_resolution"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to re-enter resolution after a narrator failure.
#[derive(Debug, Clone)]
pub struct RetryResolution {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The scene identifier.
    pub scene_id: Uuid,
}

impl Command for RetryResolution {
    fn command_type(&self) -> &'static str {
        "scene.retry_resolution"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to record that the narrator failed an attempt.
#[derive(Debug, Clone)]
pub struct RecordNarrationFailure {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The scene identifier.
    pub scene_id: Uuid,
    /// The failed attempt.
    pub attempt: u32,
    /// What went wrong.
    pub reason: String,
}

impl Command for RecordNarrationFailure {
    fn command_type(&self) -> &'static str {
        "scene.record_narration_failure"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
