//! Application services for the Resolution context.

pub mod coordinator;
pub mod rolls;
pub mod scene_lifecycle;

pub use coordinator::ResolutionSettings;

use loremaster_core::broadcast::{BroadcastEvent, BroadcastKind, Broadcaster};
use loremaster_core::clock::Clock;
use loremaster_core::command::CommandOutcome;
use loremaster_core::error::DomainError;
use loremaster_core::repository::{EventRepository, StreamAppend, flatten_batch};
use loremaster_scene::domain::aggregates::Scene;
use loremaster_scene::domain::ledger::ClosedBy;
use loremaster_turn_order::application::command_handlers::load_tracker;
use loremaster_turn_order::domain::aggregates::TurnTracker;
use serde_json::json;
use uuid::Uuid;

/// Appends every non-empty stream of `batch` atomically.
pub(crate) async fn commit(
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

/// Ends the scene's active tracker, if any, and detaches it from the scene.
/// Both changes stay pending on the aggregates.
pub(crate) async fn close_active_tracker(
    scene: &mut Scene,
    correlation_id: Uuid,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<Option<TurnTracker>, DomainError> {
    let Some(tracker_id) = scene.active_tracker_id() else {
        return Ok(None);
    };
    let mut tracker = load_tracker(tracker_id, repo).await?;
    tracker.end(correlation_id, clock)?;
    scene.detach_tracker(tracker_id, correlation_id, clock);
    Ok(Some(tracker))
}

pub(crate) fn publish_resolved(
    broadcaster: &dyn Broadcaster,
    scene: &Scene,
    closed_by: ClosedBy,
    resolution_text: Option<&str>,
) {
    broadcaster.publish(BroadcastEvent::to_campaign(
        scene.campaign_id(),
        BroadcastKind::SceneResolved,
        json!({
            "scene_id": scene.id,
            "scene_number": scene.scene_number(),
            "closed_by": closed_by,
            "resolution_text": resolution_text,
        }),
    ));
}
