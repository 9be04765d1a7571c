//! Command handlers for the Character context.
//!
//! This module contains application-level command handler functions that
//! orchestrate domain logic: load aggregate, execute command, persist events.

use loremaster_core::aggregate::AggregateRoot;
use loremaster_core::clock::Clock;
use loremaster_core::command::CommandOutcome;
use loremaster_core::error::DomainError;
use loremaster_core::event::EventMetadata;
use loremaster_core::identity::Caller;
use loremaster_core::repository::{EventRepository, StoredEvent, StreamAppend};
use loremaster_core::retry::{DEFAULT_CONFLICT_ATTEMPTS, retry_on_conflict};
use loremaster_rules::domain::dice::StatBlock;
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::Character;
use crate::domain::commands::{ClearOngoing, CreateCharacter, GrantHold};
use crate::domain::events::{CharacterEvent, CharacterEventKind};

/// Reconstitutes a `Character` from stored events.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub fn reconstitute(
    character_id: Uuid,
    existing_events: &[StoredEvent],
) -> Result<Character, DomainError> {
    let mut character = Character::new(character_id);
    for stored in existing_events {
        let kind: CharacterEventKind =
            serde_json::from_value(stored.payload.clone()).map_err(|e| {
                DomainError::Infrastructure(format!("event deserialization failed: {e}"))
            })?;
        character.apply(&CharacterEvent {
            metadata: EventMetadata::from_stored(stored),
            kind,
        });
    }
    Ok(character)
}

/// Loads a character that must already exist.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the character does not exist.
/// Returns `DomainError::Infrastructure` if loading or deserialization fails.
pub async fn load_character(
    character_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<Character, DomainError> {
    let existing_events = repo.load_existing(character_id).await?;
    reconstitute(character_id, &existing_events)
}

async fn commit(
    character: &Character,
    repo: &dyn EventRepository,
) -> Result<CommandOutcome, DomainError> {
    let append = StreamAppend::from_aggregate(character);
    let stored_events = append.events.clone();
    if !stored_events.is_empty() {
        repo.append_batch(&[append]).await?;
    }
    Ok(CommandOutcome {
        aggregate_id: character.id,
        stored_events,
    })
}

/// Handles the `CreateCharacter` command. Players may only create
/// characters they own.
///
/// # Errors
///
/// Returns `DomainError::Permission` if a player creates for someone else.
/// Returns `DomainError::Conflict` if the id is taken.
/// Returns `DomainError::Validation` if the name is blank.
pub async fn handle_create_character(
    command: &CreateCharacter,
    caller: &Caller,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<CommandOutcome, DomainError> {
    caller.require_owner_or_admin(command.user_id)?;

    let existing_events = repo.load_events(command.character_id).await?;
    let mut character = reconstitute(command.character_id, &existing_events)?;

    let stats = StatBlock::from_keyed(command.stats.iter().map(|(k, v)| (k.as_str(), *v)));
    character.create(
        command.campaign_id,
        command.user_id,
        &command.name,
        stats,
        command.correlation_id,
        clock,
    )?;

    info!(
        correlation_id = %command.correlation_id,
        character_id = %command.character_id,
        "character created"
    );
    commit(&character, repo).await
}

/// Handles the `GrantHold` command (admin only).
///
/// # Errors
///
/// Returns `DomainError::Permission` for non-admin callers.
/// Returns `DomainError::AggregateNotFound` if the character does not exist.
/// Returns `DomainError::Validation` if the grant changes nothing.
pub async fn handle_grant_hold(
    command: &GrantHold,
    caller: &Caller,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<CommandOutcome, DomainError> {
    caller.require_admin("granting holds")?;

    retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || async move {
        let mut character = load_character(command.character_id, repo).await?;
        character.grant_hold(command.forward, command.ongoing, command.correlation_id, clock)?;
        commit(&character, repo).await
    })
    .await
}

/// Handles the `ClearOngoing` command (admin only). Idempotent.
///
/// # Errors
///
/// Returns `DomainError::Permission` for non-admin callers.
/// Returns `DomainError::AggregateNotFound` if the character does not exist.
pub async fn handle_clear_ongoing(
    command: &ClearOngoing,
    caller: &Caller,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<CommandOutcome, DomainError> {
    caller.require_admin("clearing ongoing holds")?;

    retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || async move {
        let mut character = load_character(command.character_id, repo).await?;
        character.clear_ongoing(command.correlation_id, clock);
        commit(&character, repo).await
    })
    .await
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use loremaster_core::repository::to_stored_event;
    use loremaster_rules::domain::dice::Stat;
    use loremaster_test_support::{
        EmptyEventRepository, FailingEventRepository, FixedClock, RecordingEventRepository,
    };

    use super::*;

    fn create_command(user_id: Uuid) -> CreateCharacter {
        CreateCharacter {
            correlation_id: Uuid::new_v4(),
            character_id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            user_id,
            name: "Juniper".to_owned(),
            stats: BTreeMap::from([
                ("hard".to_owned(), 5),
                ("Sharp".to_owned(), 1),
                ("luck".to_owned(), 2),
            ]),
        }
    }

    fn seeded_character(character_id: Uuid, user_id: Uuid) -> Vec<StoredEvent> {
        let mut character = Character::new(character_id);
        character
            .create(
                Uuid::new_v4(),
                user_id,
                "Juniper",
                StatBlock::default(),
                Uuid::new_v4(),
                &FixedClock::default(),
            )
            .unwrap();
        character.uncommitted_events().iter().map(to_stored_event).collect()
    }

    #[tokio::test]
    async fn test_create_character_clamps_and_drops_unknown_stats() {
        // Arrange
        let user_id = Uuid::new_v4();
        let command = create_command(user_id);
        let repo = RecordingEventRepository::new();

        // Act
        let outcome = handle_create_character(
            &command,
            &Caller::player(user_id),
            &FixedClock::default(),
            &repo,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(outcome.aggregate_id, command.character_id);
        let appended = repo.appended_events();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].1, 0);
        let payload = &appended[0].2[0].payload["CharacterCreated"];
        assert_eq!(payload["stats"]["hard"], 3);
        assert_eq!(payload["stats"]["sharp"], 1);
        assert!(payload["stats"].get("luck").is_none());
        let stats: StatBlock = serde_json::from_value(payload["stats"].clone()).unwrap();
        assert_eq!(stats.get(Stat::Hard), 3);
    }

    #[tokio::test]
    async fn test_player_cannot_create_for_someone_else() {
        let command = create_command(Uuid::new_v4());

        let result = handle_create_character(
            &command,
            &Caller::player(Uuid::new_v4()),
            &FixedClock::default(),
            &EmptyEventRepository,
        )
        .await;

        assert!(matches!(result, Err(DomainError::Permission(_))));
    }

    #[tokio::test]
    async fn test_grant_hold_appends_against_loaded_version() {
        // Arrange
        let character_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new()
            .with_stream(character_id, seeded_character(character_id, Uuid::new_v4()));
        let command = GrantHold {
            correlation_id: Uuid::new_v4(),
            character_id,
            forward: 1,
            ongoing: 0,
        };

        // Act
        handle_grant_hold(&command, &Caller::admin(Uuid::new_v4()), &FixedClock::default(), &repo)
            .await
            .unwrap();

        // Assert
        let appended = repo.appended_events();
        assert_eq!(appended[0].1, 1);
        assert_eq!(appended[0].2[0].event_type, "character.hold_granted");
        assert_eq!(appended[0].2[0].sequence_number, 2);
    }

    #[tokio::test]
    async fn test_grant_hold_requires_admin() {
        let command = GrantHold {
            correlation_id: Uuid::new_v4(),
            character_id: Uuid::new_v4(),
            forward: 1,
            ongoing: 0,
        };

        let result = handle_grant_hold(
            &command,
            &Caller::player(Uuid::new_v4()),
            &FixedClock::default(),
            &EmptyEventRepository,
        )
        .await;

        assert!(matches!(result, Err(DomainError::Permission(_))));
    }

    #[tokio::test]
    async fn test_clear_ongoing_on_zero_hold_writes_nothing() {
        let character_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new()
            .with_stream(character_id, seeded_character(character_id, Uuid::new_v4()));
        let command = ClearOngoing {
            correlation_id: Uuid::new_v4(),
            character_id,
        };

        let outcome = handle_clear_ongoing(
            &command,
            &Caller::admin(Uuid::new_v4()),
            &FixedClock::default(),
            &repo,
        )
        .await
        .unwrap();

        assert!(outcome.stored_events.is_empty());
        assert!(repo.appended_events().is_empty());
    }

    #[tokio::test]
    async fn test_handler_propagates_repository_error() {
        let command = GrantHold {
            correlation_id: Uuid::new_v4(),
            character_id: Uuid::new_v4(),
            forward: 1,
            ongoing: 1,
        };

        let result = handle_grant_hold(
            &command,
            &Caller::admin(Uuid::new_v4()),
            &FixedClock::default(),
            &FailingEventRepository,
        )
        .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
