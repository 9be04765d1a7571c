//! Query handlers for the Character context.

use std::collections::BTreeMap;

use loremaster_core::error::DomainError;
use loremaster_core::repository::EventRepository;
use loremaster_rules::domain::dice::StatBlock;
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers;
use crate::domain::aggregates::Holds;

/// Read-only view of a character sheet.
#[derive(Debug, Serialize)]
pub struct CharacterView {
    /// The character identifier.
    pub character_id: Uuid,
    /// The campaign the character plays in.
    pub campaign_id: Uuid,
    /// The owning user.
    pub user_id: Uuid,
    /// The character's name.
    pub name: String,
    /// The stat block.
    pub stats: StatBlock,
    /// Current harm, `0..=6`.
    pub harm: i32,
    /// Current conditions, sorted.
    pub conditions: Vec<String>,
    /// Forward and ongoing holds.
    pub holds: Holds,
    /// Relationship scores.
    pub relationships: BTreeMap<String, i32>,
    /// Current version (event count).
    pub version: i64,
}

/// Retrieves a character by its aggregate ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID.
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub async fn get_character_by_id(
    character_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<CharacterView, DomainError> {
    let character = command_handlers::load_character(character_id, repo).await?;
    Ok(CharacterView {
        character_id,
        campaign_id: character.campaign_id,
        user_id: character.user_id,
        name: character.name.clone(),
        stats: character.stats.clone(),
        harm: character.harm,
        conditions: character.conditions.iter().cloned().collect(),
        holds: character.holds,
        relationships: character.relationships.clone(),
        version: character.version,
    })
}
