//! The narrator port.
//!
//! The narrator is an untrusted collaborator: its deltas are checked
//! against the scene before anything is written.

use std::collections::BTreeMap;

use async_trait::async_trait;
use loremaster_campaign::domain::clocks::ClockDelta;
use loremaster_character::domain::aggregates::CharacterDelta;
use loremaster_scene::domain::ledger::{PlayerAction, RollSummary};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Everything the narrator sees of a scene. Secret rolls are included.
#[derive(Debug, Clone, Serialize)]
pub struct NarrationRequest {
    /// The scene being resolved.
    pub scene_id: Uuid,
    /// The owning campaign.
    pub campaign_id: Uuid,
    /// Number within the campaign.
    pub scene_number: u32,
    /// Which attempt this is.
    pub attempt: u32,
    /// The GM's framing text.
    pub intro_text: String,
    /// Participating characters.
    pub participants: Vec<Uuid>,
    /// The action ledger.
    pub actions: Vec<PlayerAction>,
    /// Every roll made in the scene.
    pub rolls: Vec<RollSummary>,
}

/// Structured state changes requested by a narration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationDeltas {
    /// Per-character changes.
    #[serde(default)]
    pub characters: BTreeMap<Uuid, CharacterDelta>,
    /// Progress clock changes for the campaign.
    #[serde(default)]
    pub clocks: Vec<ClockDelta>,
}

/// The narrator's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narration {
    /// Prose resolving the scene.
    pub resolution_text: String,
    /// State changes to apply.
    #[serde(default)]
    pub deltas: NarrationDeltas,
}

/// Why a narration attempt produced nothing usable.
#[derive(Debug, Error)]
pub enum NarratorError {
    /// The narrator could not be reached.
    #[error("narrator unreachable: {0}")]
    Transport(String),

    /// The narrator answered with an error status.
    #[error("narrator rejected the request: {0}")]
    Rejected(String),

    /// The answer could not be decoded.
    #[error("malformed narration: {0}")]
    Malformed(String),

    /// The narrator did not answer in time.
    #[error("narrator timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// External narrative generator.
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Narrates the outcome of a scene.
    async fn narrate(&self, request: &NarrationRequest) -> Result<Narration, NarratorError>;
}

impl Narration {
    /// Checks the narration against the scene it resolves.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem: blank text or a delta
    /// aimed at a character outside the scene.
    pub fn check_against(&self, participants: &[Uuid]) -> Result<(), String> {
        if self.resolution_text.trim().is_empty() {
            return Err("narration has no resolution text".to_owned());
        }
        if let Some(stranger) = self
            .deltas
            .characters
            .keys()
            .find(|id| !participants.contains(id))
        {
            return Err(format!("delta targets character {stranger} outside the scene"));
        }
        Ok(())
    }
}
