//! Query handlers for the Turn Order context.

use loremaster_core::error::DomainError;
use loremaster_core::repository::EventRepository;
use loremaster_scene::application::command_handlers::load_scene;
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers::load_tracker;
use crate::domain::aggregates::{SkipRecord, TrackerPhase, TurnTracker};
use crate::domain::events::TurnOrderEntry;

/// Read-only view of a turn tracker. Also the `turnOrder.updated` payload.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOrderView {
    /// The tracker identifier.
    pub tracker_id: Uuid,
    /// The scene the tracker belongs to.
    pub scene_id: Uuid,
    /// Lifecycle phase.
    pub phase: TrackerPhase,
    /// Initiative order.
    pub order: Vec<TurnOrderEntry>,
    /// Pointer into `order`.
    pub current_turn_index: usize,
    /// The character whose turn it is.
    pub current_character_id: Option<Uuid>,
    /// The current round.
    pub round_number: u32,
    /// Skipped turns.
    pub skips: Vec<SkipRecord>,
    /// Current version (event count).
    pub version: i64,
}

impl From<&TurnTracker> for TurnOrderView {
    fn from(tracker: &TurnTracker) -> Self {
        Self {
            tracker_id: tracker.id,
            scene_id: tracker.scene_id,
            phase: tracker.phase,
            order: tracker.order.clone(),
            current_turn_index: tracker.current_turn_index,
            current_character_id: tracker.current_character(),
            round_number: tracker.round_number,
            skips: tracker.skips.clone(),
            version: tracker.version,
        }
    }
}

/// Retrieves the active tracker of a scene.
///
/// # Errors
///
/// Returns `DomainError::NoActiveTracker` if the scene runs freeform.
/// Returns `DomainError::AggregateNotFound` if the scene does not exist.
pub async fn get_turn_order_by_scene(
    scene_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<TurnOrderView, DomainError> {
    let scene = load_scene(scene_id, repo).await?;
    let tracker_id = scene
        .active_tracker_id()
        .ok_or(DomainError::NoActiveTracker(scene_id))?;
    let tracker = load_tracker(tracker_id, repo).await?;
    Ok(TurnOrderView::from(&tracker))
}
