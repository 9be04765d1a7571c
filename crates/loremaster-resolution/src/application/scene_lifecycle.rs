//! Opening and force-closing scenes.
//!
//! Both operations write the campaign's live-scene slot and the scene
//! stream in one batch, so a campaign never shows a live scene that does
//! not exist or a free slot while its scene is still live.

use loremaster_campaign::application::command_handlers::load_campaign;
use loremaster_character::application::command_handlers::load_character;
use loremaster_core::broadcast::Broadcaster;
use loremaster_core::clock::Clock;
use loremaster_core::command::CommandOutcome;
use loremaster_core::error::DomainError;
use loremaster_core::identity::Caller;
use loremaster_core::repository::{EventRepository, StreamAppend};
use loremaster_core::retry::{DEFAULT_CONFLICT_ATTEMPTS, retry_on_conflict};
use loremaster_scene::application::command_handlers::{load_scene, reconstitute};
use loremaster_scene::domain::ledger::ClosedBy;
use loremaster_turn_order::application::command_handlers::publish_ended;
use tracing::{info, instrument};

use super::{close_active_tracker, commit, publish_resolved};
use crate::domain::commands::{CreateScene, EndScene};

/// Handles the `CreateScene` command (admin only).
///
/// # Errors
///
/// Returns `DomainError::Conflict` if the campaign already has a live scene
/// or the scene id is taken.
/// Returns `DomainError::Validation` for an empty participant list or a
/// character that does not play in the campaign.
#[instrument(skip_all, fields(scene_id = %command.scene_id, campaign_id = %command.campaign_id))]
pub async fn handle_create_scene(
    command: &CreateScene,
    caller: &Caller,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<CommandOutcome, DomainError> {
    caller.require_admin("creating a scene")?;
    for character_id in &command.participants {
        let character = match load_character(*character_id, repo).await {
            Ok(character) => character,
            Err(DomainError::AggregateNotFound(_)) => {
                return Err(DomainError::Validation(format!(
                    "unknown character {character_id}"
                )));
            }
            Err(other) => return Err(other),
        };
        if character.campaign_id() != command.campaign_id {
            return Err(DomainError::Validation(format!(
                "character {character_id} belongs to another campaign"
            )));
        }
    }

    let (outcome, scene_number) = retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || async move {
        let mut campaign = load_campaign(command.campaign_id, repo).await?;
        let scene_number = campaign.open_scene(
            command.scene_id,
            &command.participants,
            command.correlation_id,
            clock,
        )?;

        let existing = repo.load_events(command.scene_id).await?;
        let mut scene = reconstitute(command.scene_id, &existing)?;
        scene.create(
            command.campaign_id,
            scene_number,
            command.participants.clone(),
            command.intro_text.clone(),
            command.correlation_id,
            clock,
        )?;

        let outcome = commit(
            command.scene_id,
            vec![
                StreamAppend::from_aggregate(&scene),
                StreamAppend::from_aggregate(&campaign),
            ],
            repo,
        )
        .await?;
        Ok((outcome, scene_number))
    })
    .await?;

    info!(
        correlation_id = %command.correlation_id,
        scene_number,
        participants = command.participants.len(),
        "scene created"
    );
    Ok(outcome)
}

/// Handles the `EndScene` command (admin only): forces `Resolved` without
/// narration, frees the campaign's live slot and ends any active tracker,
/// all in one batch.
///
/// # Errors
///
/// Returns `DomainError::Permission` for non-admin callers.
/// Returns `DomainError::InvalidState` if the scene is already resolved.
#[instrument(skip_all, fields(scene_id = %command.scene_id))]
pub async fn handle_end_scene(
    command: &EndScene,
    caller: &Caller,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    broadcaster: &dyn Broadcaster,
) -> Result<CommandOutcome, DomainError> {
    caller.require_admin("ending a scene")?;

    let (outcome, scene, tracker) = retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || async move {
        let mut scene = load_scene(command.scene_id, repo).await?;
        scene.end_by_admin(caller.user_id, command.correlation_id, clock)?;
        let tracker = close_active_tracker(&mut scene, command.correlation_id, clock, repo).await?;
        let mut campaign = load_campaign(scene.campaign_id(), repo).await?;
        campaign.close_scene(command.scene_id, command.correlation_id, clock);

        let mut batch = vec![
            StreamAppend::from_aggregate(&scene),
            StreamAppend::from_aggregate(&campaign),
        ];
        if let Some(tracker) = &tracker {
            batch.push(StreamAppend::from_aggregate(tracker));
        }
        let outcome = commit(command.scene_id, batch, repo).await?;
        Ok((outcome, scene, tracker))
    })
    .await?;

    info!(
        correlation_id = %command.correlation_id,
        ended_by = %caller.user_id,
        tracker_closed = tracker.is_some(),
        "scene ended by admin"
    );
    publish_resolved(broadcaster, &scene, ClosedBy::AdminOverride, None);
    if let Some(tracker) = &tracker {
        publish_ended(broadcaster, tracker);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use loremaster_campaign::application::command_handlers::load_campaign;
    use loremaster_character::application::command_handlers::handle_create_character;
    use loremaster_character::domain::commands::CreateCharacter;
    use loremaster_core::broadcast::BroadcastKind;
    use loremaster_event_store::memory_event_repository::InMemoryEventRepository;
    use loremaster_scene::domain::ledger::SceneStatus;
    use loremaster_test_support::{FixedClock, RecordingBroadcaster};
    use loremaster_turn_order::application::command_handlers::{
        handle_start_turn_order, load_tracker,
    };
    use loremaster_turn_order::domain::aggregates::{Initiative, TrackerPhase};
    use loremaster_turn_order::domain::commands::StartTurnOrder;
    use uuid::Uuid;

    use super::*;

    async fn character(repo: &dyn EventRepository, campaign_id: Uuid) -> Uuid {
        let character_id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        handle_create_character(
            &CreateCharacter {
                correlation_id: Uuid::new_v4(),
                character_id,
                campaign_id,
                user_id: owner,
                name: "Juniper".into(),
                stats: [("sharp".to_owned(), 2)].into_iter().collect(),
            },
            &Caller::player(owner),
            &FixedClock::default(),
            repo,
        )
        .await
        .unwrap();
        character_id
    }

    fn create(campaign_id: Uuid, participants: Vec<Uuid>) -> CreateScene {
        CreateScene {
            correlation_id: Uuid::new_v4(),
            scene_id: Uuid::new_v4(),
            campaign_id,
            participants,
            intro_text: "The caravan stops at dusk.".into(),
        }
    }

    #[tokio::test]
    async fn test_create_scene_opens_campaign_slot() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let campaign_id = Uuid::new_v4();
        let a = character(&repo, campaign_id).await;
        let command = create(campaign_id, vec![a]);

        // Act
        let outcome = handle_create_scene(
            &command,
            &Caller::admin(Uuid::new_v4()),
            &FixedClock::default(),
            &repo,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(outcome.stored_events.len(), 2);
        let campaign = load_campaign(campaign_id, &repo).await.unwrap();
        assert_eq!(campaign.live_scene().map(|s| s.scene_id), Some(command.scene_id));
        let scene = load_scene(command.scene_id, &repo).await.unwrap();
        assert_eq!(scene.scene_number(), 1);
        assert_eq!(scene.status(), SceneStatus::AwaitingActions);
    }

    #[tokio::test]
    async fn test_second_live_scene_conflicts() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let campaign_id = Uuid::new_v4();
        let a = character(&repo, campaign_id).await;
        let b = character(&repo, campaign_id).await;
        let admin = Caller::admin(Uuid::new_v4());
        let clock = FixedClock::default();
        handle_create_scene(&create(campaign_id, vec![a]), &admin, &clock, &repo)
            .await
            .unwrap();

        // Act
        let same_character =
            handle_create_scene(&create(campaign_id, vec![a]), &admin, &clock, &repo).await;
        let other_character =
            handle_create_scene(&create(campaign_id, vec![b]), &admin, &clock, &repo).await;

        // Assert
        assert!(matches!(
            same_character,
            Err(DomainError::Conflict(m)) if m.contains(&a.to_string())
        ));
        assert!(matches!(other_character, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_scene_validates_participants() {
        let repo = InMemoryEventRepository::new();
        let campaign_id = Uuid::new_v4();
        let foreigner = character(&repo, Uuid::new_v4()).await;
        let admin = Caller::admin(Uuid::new_v4());
        let clock = FixedClock::default();

        let empty = handle_create_scene(&create(campaign_id, vec![]), &admin, &clock, &repo).await;
        let unknown =
            handle_create_scene(&create(campaign_id, vec![Uuid::new_v4()]), &admin, &clock, &repo)
                .await;
        let foreign =
            handle_create_scene(&create(campaign_id, vec![foreigner]), &admin, &clock, &repo).await;

        assert!(matches!(empty, Err(DomainError::Validation(_))));
        assert!(matches!(unknown, Err(DomainError::Validation(_))));
        assert!(matches!(foreign, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_scene_numbers_increase_after_each_scene_ends() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let campaign_id = Uuid::new_v4();
        let a = character(&repo, campaign_id).await;
        let admin = Caller::admin(Uuid::new_v4());
        let clock = FixedClock::default();
        let broadcaster = RecordingBroadcaster::new();
        let first = create(campaign_id, vec![a]);
        handle_create_scene(&first, &admin, &clock, &repo).await.unwrap();
        handle_end_scene(
            &EndScene {
                correlation_id: Uuid::new_v4(),
                scene_id: first.scene_id,
            },
            &admin,
            &clock,
            &repo,
            &broadcaster,
        )
        .await
        .unwrap();

        // Act
        let second = create(campaign_id, vec![a]);
        handle_create_scene(&second, &admin, &clock, &repo).await.unwrap();

        // Assert
        assert_eq!(load_scene(second.scene_id, &repo).await.unwrap().scene_number(), 2);
    }

    #[tokio::test]
    async fn test_end_scene_ends_tracker_and_frees_slot() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let campaign_id = Uuid::new_v4();
        let a = character(&repo, campaign_id).await;
        let admin = Caller::admin(Uuid::new_v4());
        let clock = FixedClock::default();
        let broadcaster = RecordingBroadcaster::new();
        let scene = create(campaign_id, vec![a]);
        handle_create_scene(&scene, &admin, &clock, &repo).await.unwrap();
        let start = StartTurnOrder {
            correlation_id: Uuid::new_v4(),
            scene_id: scene.scene_id,
            tracker_id: Uuid::new_v4(),
            participants: vec![Initiative {
                character_id: a,
                initiative: 2,
            }],
        };
        handle_start_turn_order(&start, &admin, &clock, &repo, &broadcaster)
            .await
            .unwrap();
        let end = EndScene {
            correlation_id: Uuid::new_v4(),
            scene_id: scene.scene_id,
        };

        // Act
        handle_end_scene(&end, &admin, &clock, &repo, &broadcaster).await.unwrap();
        let again = handle_end_scene(&end, &admin, &clock, &repo, &broadcaster).await;

        // Assert
        let ended = load_scene(scene.scene_id, &repo).await.unwrap();
        assert_eq!(ended.status(), SceneStatus::Resolved);
        assert_eq!(ended.active_tracker_id(), None);
        let tracker = load_tracker(start.tracker_id, &repo).await.unwrap();
        assert_eq!(tracker.phase(), TrackerPhase::Ended);
        assert!(load_campaign(campaign_id, &repo).await.unwrap().live_scene().is_none());
        assert!(matches!(again, Err(DomainError::InvalidState(_))));
        assert_eq!(broadcaster.published_of(BroadcastKind::SceneResolved).len(), 1);
        assert_eq!(broadcaster.published_of(BroadcastKind::TurnOrderEnded).len(), 1);
    }

    #[tokio::test]
    async fn test_end_scene_requires_admin() {
        let repo = InMemoryEventRepository::new();
        let end = EndScene {
            correlation_id: Uuid::new_v4(),
            scene_id: Uuid::new_v4(),
        };

        let result = handle_end_scene(
            &end,
            &Caller::player(Uuid::new_v4()),
            &FixedClock::default(),
            &repo,
            &RecordingBroadcaster::new(),
        )
        .await;

        assert!(matches!(result, Err(DomainError::Permission(_))));
    }
}
