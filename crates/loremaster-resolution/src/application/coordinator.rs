//! The resolution coordinator.
//!
//! Resolution crosses two write boundaries. The first claims the scene
//! (`AwaitingActions → Resolving`, or a fresh attempt on a scene left
//! `Resolving` by a failed one). Leaving `AwaitingActions` ends the turn
//! tracker in that same batch. The narrator is then called with nothing
//! held. The second boundary writes the `Resolved` transition and every
//! delta as one batch with per-stream expected versions.

use std::collections::BTreeMap;
use std::time::Duration;

use loremaster_campaign::application::command_handlers::load_campaign;
use loremaster_character::application::command_handlers::load_character;
use loremaster_core::broadcast::Broadcaster;
use loremaster_core::clock::Clock;
use loremaster_core::command::CommandOutcome;
use loremaster_core::error::DomainError;
use loremaster_core::identity::Caller;
use loremaster_core::repository::{EventRepository, StreamAppend};
use loremaster_core::retry::{DEFAULT_CONFLICT_ATTEMPTS, retry_on_conflict};
use loremaster_scene::application::command_handlers::{
    ResolutionStarted, handle_record_narration_failure, handle_retry_resolution, load_scene,
};
use loremaster_scene::domain::commands::{BeginResolution, RecordNarrationFailure, RetryResolution};
use loremaster_scene::domain::ledger::{ClosedBy, SceneStatus};
use loremaster_turn_order::application::command_handlers::publish_ended;
use loremaster_turn_order::domain::aggregates::TurnTracker;
use tracing::{Instrument, info, info_span, instrument, warn};

use super::{close_active_tracker, commit, publish_resolved};
use crate::domain::commands::ResolveScene;
use crate::domain::narrator::{Narration, NarrationRequest, Narrator};

/// Timing knobs for resolution.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionSettings {
    /// How long a single narrator call may take.
    pub narrator_timeout: Duration,
    /// How old an in-flight attempt must be before a retry may supersede it.
    pub stale_after: chrono::Duration,
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self {
            narrator_timeout: Duration::from_secs(60),
            stale_after: chrono::Duration::seconds(300),
        }
    }
}

/// A resolved scene.
#[derive(Debug, Clone)]
pub struct SceneResolution {
    /// The persisted events across every stream the resolution touched.
    pub outcome: CommandOutcome,
    /// The attempt that won.
    pub attempt: u32,
    /// The narrator's prose.
    pub resolution_text: String,
    /// Whether this call closed a turn tracker. A tracker closed by an
    /// earlier failed attempt is not counted again.
    pub tracker_ended: bool,
}

/// Handles the `ResolveScene` command (admin only).
///
/// # Errors
///
/// Returns `DomainError::Permission` for non-admin callers.
/// Returns `DomainError::AlreadyResolving` if another attempt owns the scene.
/// Returns `DomainError::EmptyLedger` if nothing was submitted.
/// Returns `DomainError::InvalidState` if the scene is already resolved.
/// Returns `DomainError::NarratorFailure` if the narrator failed, timed out
/// or answered with unusable deltas. The scene stays `Resolving`.
#[instrument(
    skip_all,
    fields(scene_id = %command.scene_id, correlation_id = %command.correlation_id)
)]
pub async fn handle_resolve_scene(
    command: &ResolveScene,
    caller: &Caller,
    settings: &ResolutionSettings,
    narrator: &dyn Narrator,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    broadcaster: &dyn Broadcaster,
) -> Result<SceneResolution, DomainError> {
    let (started, claim_closed_tracker) =
        claim(command, caller, settings, clock, repo, broadcaster).await?;
    let attempt = started.attempt;

    let scene = load_scene(command.scene_id, repo).await?;
    let request = NarrationRequest {
        scene_id: command.scene_id,
        campaign_id: scene.campaign_id(),
        scene_number: scene.scene_number(),
        attempt,
        intro_text: scene.intro_text().to_owned(),
        participants: scene.participants().to_vec(),
        actions: scene.actions().to_vec(),
        rolls: scene.rolls().to_vec(),
    };

    let narration = match narrate(narrator, &request, settings.narrator_timeout, repo).await {
        Ok(narration) => narration,
        Err(reason) => {
            warn!(attempt, reason = %reason, "narration failed");
            handle_record_narration_failure(
                &RecordNarrationFailure {
                    correlation_id: command.correlation_id,
                    scene_id: command.scene_id,
                    attempt,
                    reason: reason.clone(),
                },
                clock,
                repo,
            )
            .await?;
            return Err(DomainError::NarratorFailure(reason));
        }
    };

    let (outcome, scene, tracker) = retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || {
        let narration = &narration;
        async move {
            let mut scene = load_scene(command.scene_id, repo).await?;
            scene.complete_resolution(
                attempt,
                narration.resolution_text.clone(),
                command.correlation_id,
                clock,
            )?;
            let tracker =
                close_active_tracker(&mut scene, command.correlation_id, clock, repo).await?;

            let mut campaign = load_campaign(scene.campaign_id(), repo).await?;
            campaign.apply_clock_deltas(&narration.deltas.clocks, command.correlation_id, clock);
            campaign.close_scene(command.scene_id, command.correlation_id, clock);

            let mut batch = vec![
                StreamAppend::from_aggregate(&scene),
                StreamAppend::from_aggregate(&campaign),
            ];
            if let Some(tracker) = &tracker {
                batch.push(StreamAppend::from_aggregate(tracker));
            }
            for (character_id, delta) in &narration.deltas.characters {
                let mut character = load_character(*character_id, repo).await?;
                character.apply_delta(command.scene_id, delta, command.correlation_id, clock);
                batch.push(StreamAppend::from_aggregate(&character));
            }

            let outcome = commit(command.scene_id, batch, repo).await?;
            Ok((outcome, scene, tracker))
        }
    })
    .await?;

    info!(
        attempt,
        events = outcome.stored_events.len(),
        characters = narration.deltas.characters.len(),
        clocks = narration.deltas.clocks.len(),
        "scene resolved"
    );
    publish_resolved(
        broadcaster,
        &scene,
        ClosedBy::Narration,
        Some(narration.resolution_text.as_str()),
    );
    if let Some(tracker) = &tracker {
        publish_ended(broadcaster, tracker);
    }

    Ok(SceneResolution {
        outcome,
        attempt,
        resolution_text: narration.resolution_text,
        tracker_ended: claim_closed_tracker || tracker.is_some(),
    })
}

/// Boundary one: begin on a fresh scene, retry on one left `Resolving`.
/// Also returns whether a turn tracker was closed.
async fn claim(
    command: &ResolveScene,
    caller: &Caller,
    settings: &ResolutionSettings,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    broadcaster: &dyn Broadcaster,
) -> Result<(ResolutionStarted, bool), DomainError> {
    caller.require_admin("resolving a scene")?;
    let scene = load_scene(command.scene_id, repo).await?;
    if scene.status() == SceneStatus::Resolving {
        let retry = RetryResolution {
            correlation_id: command.correlation_id,
            scene_id: command.scene_id,
        };
        let started =
            handle_retry_resolution(&retry, caller, settings.stale_after, clock, repo).await?;
        Ok((started, false))
    } else {
        let command = BeginResolution {
            correlation_id: command.correlation_id,
            scene_id: command.scene_id,
        };
        let (started, tracker) = begin(&command, clock, repo).await?;
        if let Some(tracker) = &tracker {
            publish_ended(broadcaster, tracker);
        }
        Ok((started, tracker.is_some()))
    }
}

/// Compare-and-set `AwaitingActions → Resolving`. The scene's active turn
/// tracker is ended and detached in the same batch.
async fn begin(
    command: &BeginResolution,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<(ResolutionStarted, Option<TurnTracker>), DomainError> {
    let (started, tracker) = retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || async move {
        let mut scene = load_scene(command.scene_id, repo).await?;
        let attempt = scene.begin_resolution(command.correlation_id, clock)?;
        let tracker = close_active_tracker(&mut scene, command.correlation_id, clock, repo).await?;

        let mut batch = vec![StreamAppend::from_aggregate(&scene)];
        if let Some(tracker) = &tracker {
            batch.push(StreamAppend::from_aggregate(tracker));
        }
        let outcome = commit(command.scene_id, batch, repo).await?;
        Ok((ResolutionStarted { attempt, outcome }, tracker))
    })
    .await?;

    info!(
        correlation_id = %command.correlation_id,
        scene_id = %command.scene_id,
        tracker_ended = tracker.is_some(),
        "scene resolution began"
    );
    Ok((started, tracker))
}

/// Calls the narrator under `timeout` and checks its answer. Unknown
/// characters and characters outside the scene make the answer unusable.
async fn narrate(
    narrator: &dyn Narrator,
    request: &NarrationRequest,
    timeout: Duration,
    repo: &dyn EventRepository,
) -> Result<Narration, String> {
    let span = info_span!("narrator_call", attempt = request.attempt);
    let narration = match tokio::time::timeout(timeout, narrator.narrate(request))
        .instrument(span)
        .await
    {
        Ok(Ok(narration)) => narration,
        Ok(Err(e)) => return Err(e.to_string()),
        Err(_) => return Err(format!("narrator timed out after {timeout:?}")),
    };

    narration.check_against(&request.participants)?;
    let mut campaigns = BTreeMap::new();
    for character_id in narration.deltas.characters.keys() {
        match load_character(*character_id, repo).await {
            Ok(character) => {
                campaigns.insert(*character_id, character.campaign_id());
            }
            Err(DomainError::AggregateNotFound(_)) => {
                return Err(format!("delta targets unknown character {character_id}"));
            }
            Err(other) => return Err(other.to_string()),
        }
    }
    if let Some((stranger, _)) = campaigns
        .iter()
        .find(|(_, campaign_id)| **campaign_id != request.campaign_id)
    {
        return Err(format!(
            "delta targets character {stranger} from another campaign"
        ));
    }
    Ok(narration)
}

#[cfg(test)]
mod tests {
    use loremaster_campaign::domain::clocks::ClockDelta;
    use loremaster_character::application::command_handlers::handle_create_character;
    use loremaster_character::domain::aggregates::CharacterDelta;
    use loremaster_character::domain::commands::CreateCharacter;
    use loremaster_core::broadcast::BroadcastKind;
    use loremaster_event_store::memory_event_repository::InMemoryEventRepository;
    use loremaster_scene::application::command_handlers::handle_submit_action;
    use loremaster_scene::domain::commands::SubmitAction;
    use loremaster_scene::domain::ledger::ActionStatus;
    use loremaster_test_support::{FixedClock, RecordingBroadcaster, YieldingEventRepository};
    use loremaster_turn_order::application::command_handlers::{
        handle_advance_turn, handle_start_turn_order, load_tracker,
    };
    use loremaster_turn_order::domain::aggregates::{Initiative, TrackerPhase};
    use loremaster_turn_order::domain::commands::{AdvanceTurn, StartTurnOrder};
    use uuid::Uuid;

    use super::*;
    use crate::application::scene_lifecycle::handle_create_scene;
    use crate::domain::commands::CreateScene;
    use crate::domain::narrator::{NarrationDeltas, NarratorError};
    use crate::testing::{ScriptedNarrator, StallingNarrator};

    struct Table {
        campaign_id: Uuid,
        scene_id: Uuid,
        owner: Uuid,
        characters: Vec<Uuid>,
        admin: Caller,
    }

    async fn open_table(repo: &dyn EventRepository, seats: usize) -> Table {
        let campaign_id = Uuid::new_v4();
        let scene_id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let admin = Caller::admin(Uuid::new_v4());
        let clock = FixedClock::default();
        let mut characters = Vec::new();
        for n in 0..seats {
            let character_id = Uuid::new_v4();
            handle_create_character(
                &CreateCharacter {
                    correlation_id: Uuid::new_v4(),
                    character_id,
                    campaign_id,
                    user_id: owner,
                    name: format!("Rook {n}"),
                    stats: BTreeMap::new(),
                },
                &admin,
                &clock,
                repo,
            )
            .await
            .unwrap();
            characters.push(character_id);
        }
        handle_create_scene(
            &CreateScene {
                correlation_id: Uuid::new_v4(),
                scene_id,
                campaign_id,
                participants: characters.clone(),
                intro_text: "The vault door groans open.".into(),
            },
            &admin,
            &clock,
            repo,
        )
        .await
        .unwrap();
        Table {
            campaign_id,
            scene_id,
            owner,
            characters,
            admin,
        }
    }

    async fn act(repo: &dyn EventRepository, table: &Table, character_id: Uuid, text: &str) {
        handle_submit_action(
            &SubmitAction {
                correlation_id: Uuid::new_v4(),
                scene_id: table.scene_id,
                action_id: Uuid::new_v4(),
                character_id,
                action_text: text.to_owned(),
                attached_roll_id: None,
            },
            &Caller::player(table.owner),
            &FixedClock::default(),
            repo,
        )
        .await
        .unwrap();
    }

    fn resolve(table: &Table) -> ResolveScene {
        ResolveScene {
            correlation_id: Uuid::new_v4(),
            scene_id: table.scene_id,
        }
    }

    fn narration(text: &str, deltas: NarrationDeltas) -> Narration {
        Narration {
            resolution_text: text.to_owned(),
            deltas,
        }
    }

    fn harm(character_id: Uuid, amount: i32) -> NarrationDeltas {
        let mut deltas = NarrationDeltas::default();
        deltas.characters.insert(
            character_id,
            CharacterDelta {
                harm: amount,
                ..CharacterDelta::default()
            },
        );
        deltas
    }

    /// Resolves as the table's admin with default settings.
    async fn resolve_as_admin(
        table: &Table,
        narrator: &dyn Narrator,
        repo: &dyn EventRepository,
        broadcaster: &dyn Broadcaster,
    ) -> Result<SceneResolution, DomainError> {
        handle_resolve_scene(
            &resolve(table),
            &table.admin,
            &ResolutionSettings::default(),
            narrator,
            &FixedClock::default(),
            repo,
            broadcaster,
        )
        .await
    }

    async fn start_tracker(
        repo: &dyn EventRepository,
        table: &Table,
        broadcaster: &dyn Broadcaster,
    ) -> Uuid {
        let start = StartTurnOrder {
            correlation_id: Uuid::new_v4(),
            scene_id: table.scene_id,
            tracker_id: Uuid::new_v4(),
            participants: table
                .characters
                .iter()
                .map(|c| Initiative {
                    character_id: *c,
                    initiative: 1,
                })
                .collect(),
        };
        let clock = FixedClock::default();
        handle_start_turn_order(&start, &table.admin, &clock, repo, broadcaster)
            .await
            .unwrap();
        start.tracker_id
    }

    #[tokio::test]
    async fn test_failed_narration_then_retry_applies_clamped_harm() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let table = open_table(&repo, 1).await;
        let hero = table.characters[0];
        act(&repo, &table, hero, "I hold the door against the horde.").await;
        let mut deltas = NarrationDeltas::default();
        deltas.characters.insert(
            hero,
            CharacterDelta {
                harm: 9,
                add_conditions: vec!["exhausted".into()],
                ..CharacterDelta::default()
            },
        );
        let narrator = ScriptedNarrator::new()
            .then(Err(NarratorError::Transport("connection reset".into())))
            .then(Ok(narration("The door holds, barely.", deltas)));
        let broadcaster = RecordingBroadcaster::new();

        // Act
        let first = resolve_as_admin(&table, &narrator, &repo, &broadcaster).await;
        let after_failure = load_scene(table.scene_id, &repo).await.unwrap();
        let second = resolve_as_admin(&table, &narrator, &repo, &broadcaster)
            .await
            .unwrap();

        // Assert
        match first {
            Err(error @ DomainError::NarratorFailure(_)) => assert!(error.is_retryable()),
            other => panic!("expected NarratorFailure, got {other:?}"),
        }
        assert_eq!(after_failure.status(), SceneStatus::Resolving);
        assert!(!after_failure.resolution_attempt().unwrap().in_flight);
        assert_eq!(after_failure.last_failure(), Some("narrator unreachable: connection reset"));
        assert_eq!(second.attempt, 2);
        let scene = load_scene(table.scene_id, &repo).await.unwrap();
        assert_eq!(scene.status(), SceneStatus::Resolved);
        assert!(scene.actions().iter().all(|a| a.status == ActionStatus::Resolved));
        let character = load_character(hero, &repo).await.unwrap();
        assert_eq!(character.harm(), 6);
        assert!(character.conditions().contains("exhausted"));
        assert!(load_campaign(table.campaign_id, &repo).await.unwrap().live_scene().is_none());
        assert_eq!(narrator.requests().len(), 2);
        let resolved = broadcaster.published_of(BroadcastKind::SceneResolved);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].payload["resolution_text"], "The door holds, barely.");
    }

    #[tokio::test]
    async fn test_timeout_is_a_narrator_failure() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let table = open_table(&repo, 1).await;
        act(&repo, &table, table.characters[0], "I wait.").await;
        let settings = ResolutionSettings {
            narrator_timeout: Duration::from_millis(20),
            ..ResolutionSettings::default()
        };

        // Act
        let result = handle_resolve_scene(
            &resolve(&table),
            &table.admin,
            &settings,
            &StallingNarrator(Duration::from_secs(30)),
            &FixedClock::default(),
            &repo,
            &RecordingBroadcaster::new(),
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::NarratorFailure(m)) if m.contains("timed out")));
        let scene = load_scene(table.scene_id, &repo).await.unwrap();
        assert_eq!(scene.status(), SceneStatus::Resolving);
    }

    #[tokio::test]
    async fn test_deltas_for_outsiders_are_rejected_before_any_write() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let table = open_table(&repo, 1).await;
        act(&repo, &table, table.characters[0], "I call for help.").await;
        let deltas = harm(Uuid::new_v4(), 2);
        let narrator = ScriptedNarrator::new().then(Ok(narration("Nobody comes.", deltas)));

        // Act
        let result = handle_resolve_scene(
            &resolve(&table),
            &table.admin,
            &ResolutionSettings::default(),
            &narrator,
            &FixedClock::default(),
            &repo,
            &RecordingBroadcaster::new(),
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::NarratorFailure(_))));
        let scene = load_scene(table.scene_id, &repo).await.unwrap();
        assert_eq!(scene.status(), SceneStatus::Resolving);
        assert_eq!(load_character(table.characters[0], &repo).await.unwrap().harm(), 0);
    }

    #[tokio::test]
    async fn test_resolution_closes_tracker_and_advances_clocks() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let table = open_table(&repo, 2).await;
        let broadcaster = RecordingBroadcaster::new();
        let tracker_id = start_tracker(&repo, &table, &broadcaster).await;
        act(&repo, &table, table.characters[1], "I cut the rope.").await;
        let deltas = NarrationDeltas {
            clocks: vec![ClockDelta {
                name: "Reinforcements".into(),
                segments: Some(4),
                advance: 2,
            }],
            ..NarrationDeltas::default()
        };
        let narrator = ScriptedNarrator::new().then(Ok(narration("The bridge falls.", deltas)));

        // Act
        let resolution = resolve_as_admin(&table, &narrator, &repo, &broadcaster)
            .await
            .unwrap();

        // Assert
        assert!(resolution.tracker_ended);
        let tracker = load_tracker(tracker_id, &repo).await.unwrap();
        assert_eq!(tracker.phase(), TrackerPhase::Ended);
        assert_eq!(load_scene(table.scene_id, &repo).await.unwrap().active_tracker_id(), None);
        let campaign = load_campaign(table.campaign_id, &repo).await.unwrap();
        let reinforcements = &campaign.clocks()["Reinforcements"];
        assert_eq!(reinforcements.segments, 4);
        assert_eq!(reinforcements.filled, 2);
        assert_eq!(broadcaster.published_of(BroadcastKind::TurnOrderEnded).len(), 1);
        assert_eq!(narrator.requests()[0].actions.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_empty_ledger_and_resolved_scene() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let table = open_table(&repo, 1).await;
        let broadcaster = RecordingBroadcaster::new();
        let done = narration("Done.", NarrationDeltas::default());
        let narrator = ScriptedNarrator::new().then(Ok(done));

        // Act
        let empty = resolve_as_admin(&table, &narrator, &repo, &broadcaster).await;
        act(&repo, &table, table.characters[0], "I leave.").await;
        resolve_as_admin(&table, &narrator, &repo, &broadcaster)
            .await
            .unwrap();
        let again = resolve_as_admin(&table, &narrator, &repo, &broadcaster).await;

        // Assert
        assert!(matches!(empty, Err(DomainError::EmptyLedger(_))));
        assert!(matches!(again, Err(DomainError::InvalidState(_))));
        assert_eq!(narrator.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_players_cannot_resolve() {
        let repo = InMemoryEventRepository::new();
        let table = open_table(&repo, 1).await;

        let result = handle_resolve_scene(
            &resolve(&table),
            &Caller::player(table.owner),
            &ResolutionSettings::default(),
            &ScriptedNarrator::new(),
            &FixedClock::default(),
            &repo,
            &RecordingBroadcaster::new(),
        )
        .await;

        assert!(matches!(result, Err(DomainError::Permission(_))));
    }

    #[tokio::test]
    async fn test_leaving_awaiting_actions_ends_tracker_even_when_narration_fails() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let table = open_table(&repo, 2).await;
        let broadcaster = RecordingBroadcaster::new();
        let tracker_id = start_tracker(&repo, &table, &broadcaster).await;
        act(&repo, &table, table.characters[0], "I kick over the brazier.").await;
        let narrator = ScriptedNarrator::new()
            .then(Err(NarratorError::Transport("connection refused".into())))
            .then(Ok(narration("Smoke fills the hall.", NarrationDeltas::default())));

        // Act
        let failed = resolve_as_admin(&table, &narrator, &repo, &broadcaster).await;
        let advance = handle_advance_turn(
            &AdvanceTurn {
                correlation_id: Uuid::new_v4(),
                scene_id: table.scene_id,
            },
            &table.admin,
            &FixedClock::default(),
            &repo,
            &broadcaster,
        )
        .await;
        let retried = resolve_as_admin(&table, &narrator, &repo, &broadcaster)
            .await
            .unwrap();

        // Assert
        assert!(matches!(failed, Err(DomainError::NarratorFailure(_))));
        assert!(matches!(advance, Err(DomainError::NoActiveTracker(id)) if id == table.scene_id));
        let tracker = load_tracker(tracker_id, &repo).await.unwrap();
        assert_eq!(tracker.phase(), TrackerPhase::Ended);
        assert!(!retried.tracker_ended);
        assert_eq!(broadcaster.published_of(BroadcastKind::TurnOrderUpdated).len(), 1);
        assert_eq!(broadcaster.published_of(BroadcastKind::TurnOrderEnded).len(), 1);
    }

    #[tokio::test]
    async fn test_two_actions_then_failed_narration_then_retry_adds_one_harm() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let table = open_table(&repo, 2).await;
        let (char_a, char_b) = (table.characters[0], table.characters[1]);
        act(&repo, &table, char_a, "I vault the counter.").await;
        act(&repo, &table, char_b, "I cover the door.").await;
        let narrator = ScriptedNarrator::new()
            .then(Err(NarratorError::Transport("connection reset".into())))
            .then(Ok(narration("A bottle catches Ash.", harm(char_a, 1))));
        let broadcaster = RecordingBroadcaster::new();
        let harm_before = load_character(char_a, &repo).await.unwrap().harm();

        // Act
        let first = resolve_as_admin(&table, &narrator, &repo, &broadcaster).await;
        let second = resolve_as_admin(&table, &narrator, &repo, &broadcaster).await;

        // Assert
        assert!(matches!(first, Err(DomainError::NarratorFailure(_))));
        assert_eq!(second.unwrap().attempt, 2);
        let scene = load_scene(table.scene_id, &repo).await.unwrap();
        assert_eq!(scene.status(), SceneStatus::Resolved);
        assert_eq!(scene.actions().len(), 2);
        assert!(scene.actions().iter().all(|a| a.status == ActionStatus::Resolved));
        let harm_after = load_character(char_a, &repo).await.unwrap().harm();
        assert_eq!(harm_after, harm_before + 1);
        assert_eq!(load_character(char_b, &repo).await.unwrap().harm(), 0);
        assert_eq!(narrator.requests()[1].actions.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_begins_have_one_winner() {
        // Arrange
        let repo = YieldingEventRepository::new(InMemoryEventRepository::new());
        let table = open_table(&repo, 1).await;
        act(&repo, &table, table.characters[0], "I light the beacon.").await;
        let clock = FixedClock::default();
        let begin_command = || BeginResolution {
            correlation_id: Uuid::new_v4(),
            scene_id: table.scene_id,
        };
        let (first, second) = (begin_command(), begin_command());

        // Act
        let (a, b) = tokio::join!(
            begin(&first, &clock, &repo),
            begin(&second, &clock, &repo),
        );

        // Assert
        let (winner, loser) = if a.is_ok() { (a, b) } else { (b, a) };
        assert_eq!(winner.unwrap().0.attempt, 1);
        assert!(matches!(loser, Err(DomainError::AlreadyResolving(id)) if id == table.scene_id));
        let scene = load_scene(table.scene_id, &repo).await.unwrap();
        assert_eq!(scene.status(), SceneStatus::Resolving);
    }
}
