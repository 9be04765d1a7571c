//! Query handlers for the Scene context.

use loremaster_core::error::DomainError;
use loremaster_core::identity::Caller;
use loremaster_core::repository::EventRepository;
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers;
use crate::domain::ledger::{
    ClosedBy, PlayerAction, ResolutionAttempt, RollSummary, SceneStatus,
};

/// Read-only view of a scene.
#[derive(Debug, Serialize)]
pub struct SceneView {
    /// The scene identifier.
    pub scene_id: Uuid,
    /// The owning campaign.
    pub campaign_id: Uuid,
    /// Number within the campaign.
    pub scene_number: u32,
    /// Lifecycle status.
    pub status: SceneStatus,
    /// Participating characters.
    pub participants: Vec<Uuid>,
    /// The GM's framing text.
    pub intro_text: String,
    /// The narrator's resolution, once resolved.
    pub resolution_text: Option<String>,
    /// The action ledger.
    pub actions: Vec<PlayerAction>,
    /// Rolls the caller may see.
    pub rolls: Vec<RollSummary>,
    /// The active turn tracker, if any.
    pub active_tracker_id: Option<Uuid>,
    /// The current resolution attempt.
    pub resolution_attempt: Option<ResolutionAttempt>,
    /// Why the last attempt failed, if it did.
    pub last_failure: Option<String>,
    /// How the scene was closed.
    pub closed_by: Option<ClosedBy>,
    /// Current version (event count).
    pub version: i64,
}

/// Retrieves a scene. Secret rolls are left out unless the caller made
/// them or is an admin.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID.
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub async fn get_scene_by_id(
    scene_id: Uuid,
    caller: &Caller,
    repo: &dyn EventRepository,
) -> Result<SceneView, DomainError> {
    let scene = command_handlers::load_scene(scene_id, repo).await?;
    let rolls = scene
        .rolls
        .iter()
        .filter(|roll| roll.visible_to(caller.user_id, caller.is_admin()))
        .cloned()
        .collect();

    Ok(SceneView {
        scene_id,
        campaign_id: scene.campaign_id,
        scene_number: scene.scene_number,
        status: scene.status,
        participants: scene.participants.clone(),
        intro_text: scene.intro_text.clone(),
        resolution_text: scene.resolution_text.clone(),
        actions: scene.actions.clone(),
        rolls,
        active_tracker_id: scene.active_tracker_id,
        resolution_attempt: scene.resolution_attempt,
        last_failure: scene.last_failure().map(str::to_owned),
        closed_by: scene.closed_by,
        version: scene.version,
    })
}

#[cfg(test)]
mod tests {
    use loremaster_core::aggregate::AggregateRoot;
    use loremaster_core::repository::to_stored_event;
    use loremaster_rules::domain::dice::Outcome;
    use loremaster_test_support::{
        EmptyEventRepository, FixedClock, RecordingEventRepository,
    };

    use super::*;
    use crate::domain::aggregates::Scene;

    fn summary(character_id: Uuid, user_id: Uuid, is_secret: bool) -> RollSummary {
        RollSummary {
            roll_id: Uuid::new_v4(),
            character_id,
            user_id,
            stat: None,
            move_id: None,
            dice: [5, 5],
            modifier: 0,
            total: 10,
            outcome: Outcome::StrongHit,
            is_secret,
        }
    }

    #[tokio::test]
    async fn test_get_scene_by_id_hides_other_players_secret_rolls() {
        // Arrange
        let scene_id = Uuid::new_v4();
        let character_id = Uuid::new_v4();
        let roller = Uuid::new_v4();
        let clock = FixedClock::default();
        let mut scene = Scene::new(scene_id);
        scene
            .create(
                Uuid::new_v4(),
                2,
                vec![character_id],
                "Fog.".into(),
                Uuid::new_v4(),
                &clock,
            )
            .unwrap();
        let created = scene.uncommitted_events()[0].clone();
        scene.clear_uncommitted_events();
        scene.apply(&created);
        for is_secret in [true, false] {
            let roll = summary(character_id, roller, is_secret);
            scene.attach_roll(roll, Uuid::new_v4(), &clock).unwrap();
        }
        let mut events = vec![to_stored_event(&created)];
        events.extend(scene.uncommitted_events().iter().map(to_stored_event));
        let repo = RecordingEventRepository::new().with_stream(scene_id, events);

        // Act
        let other = get_scene_by_id(scene_id, &Caller::player(Uuid::new_v4()), &repo)
            .await
            .unwrap();
        let own = get_scene_by_id(scene_id, &Caller::player(roller), &repo)
            .await
            .unwrap();

        // Assert
        assert_eq!(other.rolls.len(), 1);
        assert!(!other.rolls[0].is_secret);
        assert_eq!(own.rolls.len(), 2);
        assert_eq!(own.status, SceneStatus::AwaitingActions);
        assert_eq!(own.scene_number, 2);
        assert_eq!(own.version, 3);
    }

    #[tokio::test]
    async fn test_get_scene_by_id_returns_not_found_when_no_events() {
        let scene_id = Uuid::new_v4();

        let admin = Caller::admin(Uuid::new_v4());
        let result = get_scene_by_id(scene_id, &admin, &EmptyEventRepository).await;

        match result.unwrap_err() {
            DomainError::AggregateNotFound(id) => assert_eq!(id, scene_id),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }
}
