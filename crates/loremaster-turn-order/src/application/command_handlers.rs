//! Command handlers for the Turn Order context.
//!
//! Handlers find the tracker through the scene's `active_tracker_id`, so a
//! scene without one answers `NoActiveTracker`. Turns only move while the
//! scene awaits actions. Starting and ending write the tracker and the
//! scene in one batch.

use loremaster_character::application::command_handlers::load_character;
use loremaster_core::aggregate::AggregateRoot;
use loremaster_core::broadcast::{BroadcastEvent, BroadcastKind, Broadcaster};
use loremaster_core::clock::Clock;
use loremaster_core::command::CommandOutcome;
use loremaster_core::error::DomainError;
use loremaster_core::event::EventMetadata;
use loremaster_core::identity::Caller;
use loremaster_core::repository::{EventRepository, StoredEvent, StreamAppend, flatten_batch};
use loremaster_core::retry::{DEFAULT_CONFLICT_ATTEMPTS, retry_on_conflict};
use loremaster_scene::application::command_handlers::load_scene;
use loremaster_scene::domain::aggregates::Scene;
use loremaster_scene::domain::ledger::SceneStatus;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::application::query_handlers::TurnOrderView;
use crate::domain::aggregates::{TrackerPhase, TurnTracker};
use crate::domain::commands::{AdvanceTurn, EndTurn, EndTurnOrder, SkipTurn, StartTurnOrder};
use crate::domain::events::{TurnOrderEvent, TurnOrderEventKind};

/// Reconstitutes a `TurnTracker` from stored events.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub fn reconstitute(
    tracker_id: Uuid,
    existing_events: &[StoredEvent],
) -> Result<TurnTracker, DomainError> {
    let mut tracker = TurnTracker::new(tracker_id);
    for stored in existing_events {
        let kind: TurnOrderEventKind =
            serde_json::from_value(stored.payload.clone()).map_err(|e| {
                DomainError::Infrastructure(format!("event deserialization failed: {e}"))
            })?;
        tracker.apply(&TurnOrderEvent {
            metadata: EventMetadata::from_stored(stored),
            kind,
        });
    }
    Ok(tracker)
}

/// Loads a tracker that must already exist.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the tracker does not exist.
/// Returns `DomainError::Infrastructure` if loading or deserialization fails.
pub async fn load_tracker(
    tracker_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<TurnTracker, DomainError> {
    let existing_events = repo.load_existing(tracker_id).await?;
    reconstitute(tracker_id, &existing_events)
}

/// Loads a scene together with its active tracker. A tracker still attached
/// to a scene that left `AwaitingActions` is not live.
async fn load_active(
    scene_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<(Scene, TurnTracker), DomainError> {
    let scene = load_scene(scene_id, repo).await?;
    let tracker_id = scene
        .active_tracker_id()
        .ok_or(DomainError::NoActiveTracker(scene_id))?;
    if scene.status() != SceneStatus::AwaitingActions {
        return Err(DomainError::InvalidState(format!(
            "cannot move turns: scene {scene_id} is {}",
            scene.status().as_str()
        )));
    }
    let tracker = load_tracker(tracker_id, repo).await?;
    Ok((scene, tracker))
}

async fn commit(
    aggregate_id: Uuid,
    batch: Vec<StreamAppend>,
    repo: &dyn EventRepository,
) -> Result<CommandOutcome, DomainError> {
    let batch: Vec<StreamAppend> = batch.into_iter().filter(|a| !a.events.is_empty()).collect();
    let stored_events = flatten_batch(&batch);
    if !batch.is_empty() {
        repo.append_batch(&batch).await?;
    }
    Ok(CommandOutcome {
        aggregate_id,
        stored_events,
    })
}

fn publish_updated(broadcaster: &dyn Broadcaster, campaign_id: Uuid, view: &TurnOrderView) {
    // Serialization of derived Serialize types to Value is infallible.
    let payload = serde_json::to_value(view).expect("TurnOrderView serialization is infallible");
    broadcaster.publish(BroadcastEvent::to_campaign(
        campaign_id,
        BroadcastKind::TurnOrderUpdated,
        payload,
    ));
}

/// Publishes `turnOrder.ended` for a tracker closed by any path.
pub fn publish_ended(broadcaster: &dyn Broadcaster, tracker: &TurnTracker) {
    broadcaster.publish(BroadcastEvent::to_campaign(
        tracker.campaign_id(),
        BroadcastKind::TurnOrderEnded,
        json!({
            "tracker_id": tracker.id,
            "scene_id": tracker.scene_id(),
            "final_round": tracker.round_number(),
        }),
    ));
}

/// Handles the `StartTurnOrder` command (admin only).
///
/// # Errors
///
/// Returns `DomainError::Conflict` if the scene already has an active tracker.
/// Returns `DomainError::InvalidState` unless the scene is awaiting actions.
/// Returns `DomainError::Validation` for an empty or duplicated list, or a
/// character that is not in the scene.
pub async fn handle_start_turn_order(
    command: &StartTurnOrder,
    caller: &Caller,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    broadcaster: &dyn Broadcaster,
) -> Result<CommandOutcome, DomainError> {
    caller.require_admin("starting turn order")?;

    let (outcome, view, campaign_id) = retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || async move {
        let mut scene = load_scene(command.scene_id, repo).await?;
        scene.attach_tracker(command.tracker_id, command.correlation_id, clock)?;
        if let Some(outsider) = command
            .participants
            .iter()
            .find(|p| !scene.is_participant(p.character_id))
        {
            return Err(DomainError::Validation(format!(
                "character {} is not in scene {}",
                outsider.character_id, command.scene_id
            )));
        }

        let existing = repo.load_events(command.tracker_id).await?;
        let mut tracker = reconstitute(command.tracker_id, &existing)?;
        tracker.start(
            scene.campaign_id(),
            command.scene_id,
            &command.participants,
            command.correlation_id,
            clock,
        )?;
        let outcome = commit(
            command.tracker_id,
            vec![
                StreamAppend::from_aggregate(&tracker),
                StreamAppend::from_aggregate(&scene),
            ],
            repo,
        )
        .await?;

        let pending = tracker.uncommitted_events().to_vec();
        tracker.clear_uncommitted_events();
        for event in &pending {
            tracker.apply(event);
        }
        Ok((outcome, TurnOrderView::from(&tracker), scene.campaign_id()))
    })
    .await?;

    info!(
        correlation_id = %command.correlation_id,
        scene_id = %command.scene_id,
        tracker_id = %command.tracker_id,
        participants = command.participants.len(),
        "turn order started"
    );
    publish_updated(broadcaster, campaign_id, &view);
    Ok(outcome)
}

/// Runs one pointer move against the scene's active tracker and publishes
/// the new order.
async fn move_turn<F>(
    scene_id: Uuid,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    broadcaster: &dyn Broadcaster,
    step: F,
) -> Result<CommandOutcome, DomainError>
where
    F: Fn(&mut TurnTracker, &dyn Clock) -> Result<(), DomainError>,
{
    let step = &step;
    let (outcome, view, campaign_id) = retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || async move {
        let (_, mut tracker) = load_active(scene_id, repo).await?;
        step(&mut tracker, clock)?;
        let outcome = commit(tracker.id, vec![StreamAppend::from_aggregate(&tracker)], repo).await?;

        let pending = tracker.uncommitted_events().to_vec();
        tracker.clear_uncommitted_events();
        for event in &pending {
            tracker.apply(event);
        }
        Ok((outcome, TurnOrderView::from(&tracker), tracker.campaign_id()))
    })
    .await?;

    publish_updated(broadcaster, campaign_id, &view);
    Ok(outcome)
}

/// Handles the `EndTurn` command. Players may only end turns of characters
/// they own, and only when it is that character's turn.
///
/// # Errors
///
/// Returns `DomainError::Permission` if a player does not own the character.
/// Returns `DomainError::NotYourTurn` if it is someone else's turn.
/// Returns `DomainError::NoActiveTracker` if the scene runs freeform.
pub async fn handle_end_turn(
    command: &EndTurn,
    caller: &Caller,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    broadcaster: &dyn Broadcaster,
) -> Result<CommandOutcome, DomainError> {
    if !caller.is_admin() {
        let character = load_character(command.character_id, repo).await?;
        caller.require_owner_or_admin(character.user_id())?;
    }

    let by_admin = caller.is_admin();
    let outcome = move_turn(command.scene_id, clock, repo, broadcaster, |tracker, clock| {
        tracker.end_turn(command.character_id, by_admin, command.correlation_id, clock)
    })
    .await?;

    info!(
        correlation_id = %command.correlation_id,
        scene_id = %command.scene_id,
        character_id = %command.character_id,
        by_admin,
        "turn ended"
    );
    Ok(outcome)
}

/// Handles the `AdvanceTurn` command (admin only).
///
/// # Errors
///
/// Returns `DomainError::Permission` for non-admin callers.
/// Returns `DomainError::NoActiveTracker` if the scene runs freeform.
pub async fn handle_advance_turn(
    command: &AdvanceTurn,
    caller: &Caller,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    broadcaster: &dyn Broadcaster,
) -> Result<CommandOutcome, DomainError> {
    caller.require_admin("advancing the turn")?;
    let outcome = move_turn(command.scene_id, clock, repo, broadcaster, |tracker, clock| {
        tracker.advance(command.correlation_id, clock)
    })
    .await?;
    info!(correlation_id = %command.correlation_id, scene_id = %command.scene_id, "turn advanced");
    Ok(outcome)
}

/// Handles the `SkipTurn` command (admin only).
///
/// # Errors
///
/// Returns `DomainError::Permission` for non-admin callers.
/// Returns `DomainError::Validation` for a blank reason.
/// Returns `DomainError::NoActiveTracker` if the scene runs freeform.
pub async fn handle_skip_turn(
    command: &SkipTurn,
    caller: &Caller,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    broadcaster: &dyn Broadcaster,
) -> Result<CommandOutcome, DomainError> {
    caller.require_admin("skipping a turn")?;
    let outcome = move_turn(command.scene_id, clock, repo, broadcaster, |tracker, clock| {
        tracker.skip(&command.reason, command.correlation_id, clock)
    })
    .await?;
    info!(
        correlation_id = %command.correlation_id,
        scene_id = %command.scene_id,
        reason = %command.reason,
        "turn skipped"
    );
    Ok(outcome)
}

/// Handles the `EndTurnOrder` command (admin only). Ending an already
/// ended tracker succeeds without writing anything.
///
/// # Errors
///
/// Returns `DomainError::Permission` for non-admin callers.
/// Returns `DomainError::NoActiveTracker` if the scene never had a tracker.
pub async fn handle_end_turn_order(
    command: &EndTurnOrder,
    caller: &Caller,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    broadcaster: &dyn Broadcaster,
) -> Result<CommandOutcome, DomainError> {
    caller.require_admin("ending turn order")?;

    let (outcome, ended) = retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || async move {
        let mut scene = load_scene(command.scene_id, repo).await?;
        let Some(tracker_id) = scene.active_tracker_id() else {
            return match scene.last_tracker_id() {
                Some(last) => {
                    let tracker = load_tracker(last, repo).await?;
                    if tracker.phase() == TrackerPhase::Ended {
                        Ok((
                            CommandOutcome {
                                aggregate_id: last,
                                stored_events: Vec::new(),
                            },
                            None,
                        ))
                    } else {
                        Err(DomainError::NoActiveTracker(command.scene_id))
                    }
                }
                None => Err(DomainError::NoActiveTracker(command.scene_id)),
            };
        };

        let mut tracker = load_tracker(tracker_id, repo).await?;
        let ended = tracker.end(command.correlation_id, clock)?;
        scene.detach_tracker(tracker_id, command.correlation_id, clock);
        let outcome = commit(
            tracker_id,
            vec![
                StreamAppend::from_aggregate(&tracker),
                StreamAppend::from_aggregate(&scene),
            ],
            repo,
        )
        .await?;
        Ok((outcome, ended.then_some(tracker)))
    })
    .await?;

    if let Some(tracker) = ended {
        info!(
            correlation_id = %command.correlation_id,
            scene_id = %command.scene_id,
            tracker_id = %tracker.id,
            "turn order ended"
        );
        publish_ended(broadcaster, &tracker);
    }
    Ok(outcome)
}
