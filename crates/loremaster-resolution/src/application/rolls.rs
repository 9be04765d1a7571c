//! Rolling dice for a character.
//!
//! A roll records the `DiceRoll`, consumes the character's forward hold
//! and, inside a scene, attaches a summary to the scene's roll history.
//! The three streams are written in one batch, so forward is spent exactly
//! once per recorded roll.

use std::sync::Mutex;

use loremaster_character::application::command_handlers::load_character;
use loremaster_core::broadcast::{Audience, BroadcastEvent, BroadcastKind, Broadcaster};
use loremaster_core::clock::Clock;
use loremaster_core::command::CommandOutcome;
use loremaster_core::error::DomainError;
use loremaster_core::identity::Caller;
use loremaster_core::repository::{EventRepository, StreamAppend};
use loremaster_core::retry::{DEFAULT_CONFLICT_ATTEMPTS, retry_on_conflict};
use loremaster_core::rng::DeterministicRng;
use loremaster_rules::application::command_handlers::{draw, stage_roll};
use loremaster_rules::domain::aggregates::RollContext;
use loremaster_rules::domain::dice::{RollInputs, resolve_stat_key};
use loremaster_rules::domain::events::DiceRolled;
use loremaster_scene::application::command_handlers::load_scene;
use loremaster_scene::domain::ledger::{RollSummary, SceneStatus};
use tracing::{info, instrument};

use super::commit;
use crate::domain::commands::RollDice;

/// A recorded roll.
#[derive(Debug, Clone)]
pub struct RollRecorded {
    /// The persisted events across every stream the roll touched.
    pub outcome: CommandOutcome,
    /// The roll as stored.
    pub roll: DiceRolled,
}

/// Handles the `RollDice` command.
///
/// # Errors
///
/// Returns `DomainError::Permission` if the caller does not own the character.
/// Returns `DomainError::InvalidState` if the scene is not awaiting actions.
/// Returns `DomainError::Validation` if the character is not in the scene.
/// Returns `DomainError::Conflict` if the roll id is already used.
#[instrument(skip_all, fields(roll_id = %command.roll_id, character_id = %command.character_id))]
pub async fn handle_roll_dice(
    command: &RollDice,
    caller: &Caller,
    rng: &Mutex<dyn DeterministicRng + Send>,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    broadcaster: &dyn Broadcaster,
) -> Result<RollRecorded, DomainError> {
    let owner = load_character(command.character_id, repo).await?.user_id();
    caller.require_owner_or_admin(owner)?;
    let stat = resolve_stat_key(command.stat.as_deref());
    let situational = command.situational_modifier();

    let recorded = retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || async move {
        let mut character = load_character(command.character_id, repo).await?;
        let mut scene = match command.scene_id {
            Some(scene_id) => {
                let scene = load_scene(scene_id, repo).await?;
                if scene.status() != SceneStatus::AwaitingActions {
                    return Err(DomainError::InvalidState(format!(
                        "cannot roll: scene {scene_id} is {}",
                        scene.status().as_str()
                    )));
                }
                if scene.campaign_id() != character.campaign_id() {
                    return Err(DomainError::Validation(format!(
                        "character {} belongs to another campaign",
                        command.character_id
                    )));
                }
                Some(scene)
            }
            None => None,
        };

        let holds = character.holds();
        let computation = draw(
            &RollInputs {
                stats: character.stats(),
                stat,
                situational,
                forward: holds.forward,
                ongoing: holds.ongoing,
            },
            rng,
        )?;
        let context = RollContext {
            campaign_id: character.campaign_id(),
            scene_id: command.scene_id,
            character_id: command.character_id,
            user_id: caller.user_id,
            stat,
            move_id: command.move_id.clone(),
            is_secret: command.is_secret,
        };
        let (roll, roll_append) = stage_roll(
            command.roll_id,
            context,
            &computation,
            command.correlation_id,
            clock,
            repo,
        )
        .await?;
        let Some(record) = roll.pending_record().cloned() else {
            return Err(DomainError::Infrastructure(
                "staged roll has no record".into(),
            ));
        };

        character.consume_forward(command.roll_id, command.correlation_id, clock);
        let mut batch = vec![roll_append, StreamAppend::from_aggregate(&character)];
        if let Some(scene) = scene.as_mut() {
            scene.attach_roll(
                RollSummary {
                    roll_id: record.roll_id,
                    character_id: record.character_id,
                    user_id: record.user_id,
                    stat: record.stat,
                    move_id: record.move_id.clone(),
                    dice: record.dice,
                    modifier: record.modifier,
                    total: record.total,
                    outcome: record.outcome,
                    is_secret: record.is_secret,
                },
                command.correlation_id,
                clock,
            )?;
            batch.push(StreamAppend::from_aggregate(&*scene));
        }

        let outcome = commit(command.roll_id, batch, repo).await?;
        Ok(RollRecorded {
            outcome,
            roll: record,
        })
    })
    .await?;

    info!(
        correlation_id = %command.correlation_id,
        total = recorded.roll.total,
        outcome = recorded.roll.outcome.as_str(),
        forward = recorded.roll.breakdown.forward,
        is_secret = recorded.roll.is_secret,
        "dice rolled"
    );

    // Serialization of derived Serialize types to Value is infallible.
    let payload =
        serde_json::to_value(&recorded.roll).expect("DiceRolled serialization is infallible");
    broadcaster.publish(BroadcastEvent {
        campaign_id: recorded.roll.campaign_id,
        audience: if recorded.roll.is_secret {
            Audience::User(recorded.roll.user_id)
        } else {
            Audience::Campaign
        },
        kind: BroadcastKind::DiceRolled,
        payload,
    });
    Ok(recorded)
}
