//! Command handlers for the Scene context.
//!
//! Each handler loads the scene, runs the aggregate's guard, and appends
//! against the loaded version. Lost version races are retried from the
//! reload, so a guard that no longer holds surfaces as its own error.
//! The first resolution attempt is claimed by the resolution coordinator,
//! which closes the turn tracker in the same batch.

use chrono::Duration;
use loremaster_character::application::command_handlers::load_character;
use loremaster_core::aggregate::AggregateRoot;
use loremaster_core::clock::Clock;
use loremaster_core::command::CommandOutcome;
use loremaster_core::error::DomainError;
use loremaster_core::event::EventMetadata;
use loremaster_core::identity::Caller;
use loremaster_core::repository::{EventRepository, StoredEvent, StreamAppend};
use loremaster_core::retry::{DEFAULT_CONFLICT_ATTEMPTS, retry_on_conflict};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::aggregates::Scene;
use crate::domain::commands::{RecordNarrationFailure, RetryResolution, SubmitAction};
use crate::domain::events::{SceneEvent, SceneEventKind};

/// Reconstitutes a `Scene` from stored events.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub fn reconstitute(
    scene_id: Uuid,
    existing_events: &[StoredEvent],
) -> Result<Scene, DomainError> {
    let mut scene = Scene::new(scene_id);
    for stored in existing_events {
        let kind: SceneEventKind =
            serde_json::from_value(stored.payload.clone()).map_err(|e| {
                DomainError::Infrastructure(format!("event deserialization failed: {e}"))
            })?;
        scene.apply(&SceneEvent {
            metadata: EventMetadata::from_stored(stored),
            kind,
        });
    }
    Ok(scene)
}

/// Loads a scene that must already exist.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the scene does not exist.
/// Returns `DomainError::Infrastructure` if loading or deserialization fails.
pub async fn load_scene(scene_id: Uuid, repo: &dyn EventRepository) -> Result<Scene, DomainError> {
    let existing_events = repo.load_existing(scene_id).await?;
    reconstitute(scene_id, &existing_events)
}

async fn commit(
    scene: &Scene,
    repo: &dyn EventRepository,
) -> Result<CommandOutcome, DomainError> {
    let append = StreamAppend::from_aggregate(scene);
    let stored_events = append.events.clone();
    if !stored_events.is_empty() {
        repo.append_batch(&[append]).await?;
    }
    Ok(CommandOutcome {
        aggregate_id: scene.id,
        stored_events,
    })
}

/// A resolution attempt that now owns the scene.
#[derive(Debug, Clone)]
pub struct ResolutionStarted {
    /// The attempt number to report back on failure or completion.
    pub attempt: u32,
    /// The persisted transition.
    pub outcome: CommandOutcome,
}

/// Handles the `SubmitAction` command.
///
/// # Errors
///
/// Returns `DomainError::Permission` if the caller does not own the character.
/// Returns `DomainError::InvalidState` unless the scene is awaiting actions.
/// Returns `DomainError::Validation` for blank text, a non-participant or a
/// character from another campaign.
pub async fn handle_submit_action(
    command: &SubmitAction,
    caller: &Caller,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<CommandOutcome, DomainError> {
    let character = load_character(command.character_id, repo).await?;
    caller.require_owner_or_admin(character.user_id())?;
    let character = &character;

    let outcome = retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || async move {
        let mut scene = load_scene(command.scene_id, repo).await?;
        if scene.campaign_id() != character.campaign_id() {
            return Err(DomainError::Validation(format!(
                "character {} belongs to another campaign",
                command.character_id
            )));
        }
        scene.submit_action(
            command.action_id,
            command.character_id,
            caller.user_id,
            &command.action_text,
            command.attached_roll_id,
            command.correlation_id,
            clock,
        )?;
        commit(&scene, repo).await
    })
    .await?;

    info!(
        correlation_id = %command.correlation_id,
        scene_id = %command.scene_id,
        action_id = %command.action_id,
        "action submitted"
    );
    Ok(outcome)
}

/// Handles the `RetryResolution` command (admin only): compare-and-set on
/// the attempt marker of a `Resolving` scene.
///
/// # Errors
///
/// Returns `DomainError::Permission` for non-admin callers.
/// Returns `DomainError::AlreadyResolving` if a fresh attempt is in flight.
/// Returns `DomainError::InvalidState` unless the scene is resolving.
pub async fn handle_retry_resolution(
    command: &RetryResolution,
    caller: &Caller,
    stale_after: Duration,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<ResolutionStarted, DomainError> {
    caller.require_admin("resolving a scene")?;

    retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || async move {
        let mut scene = load_scene(command.scene_id, repo).await?;
        let attempt = scene.retry_resolution(stale_after, command.correlation_id, clock)?;
        let outcome = commit(&scene, repo).await?;
        info!(
            correlation_id = %command.correlation_id,
            scene_id = %command.scene_id,
            attempt,
            "scene resolution retried"
        );
        Ok(ResolutionStarted { attempt, outcome })
    })
    .await
}

/// Handles the `RecordNarrationFailure` command. Issued by the coordinator,
/// not by clients.
///
/// # Errors
///
/// Returns `DomainError::InvalidState` if the scene left `Resolving`.
pub async fn handle_record_narration_failure(
    command: &RecordNarrationFailure,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<CommandOutcome, DomainError> {
    retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || async move {
        let mut scene = load_scene(command.scene_id, repo).await?;
        let recorded = scene.record_narration_failure(
            command.attempt,
            &command.reason,
            command.correlation_id,
            clock,
        )?;
        if !recorded {
            warn!(
                scene_id = %command.scene_id,
                attempt = command.attempt,
                "dropping failure of a superseded resolution attempt"
            );
        }
        commit(&scene, repo).await
    })
    .await
}
