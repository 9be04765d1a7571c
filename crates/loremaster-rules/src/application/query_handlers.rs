//! Query handlers for the Dice Resolution context.

use chrono::{DateTime, Utc};
use loremaster_core::error::DomainError;
use loremaster_core::identity::Caller;
use loremaster_core::repository::EventRepository;
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers;
use crate::domain::dice::{ModifierBreakdown, Outcome, Stat};

/// Read-only view of a recorded roll.
#[derive(Debug, Serialize)]
pub struct RollView {
    /// The roll identifier.
    pub roll_id: Uuid,
    /// The campaign the roll belongs to.
    pub campaign_id: Uuid,
    /// The scene the roll was made in, if any.
    pub scene_id: Option<Uuid>,
    /// The rolling character.
    pub character_id: Uuid,
    /// The user who made the roll.
    pub user_id: Uuid,
    /// The stat rolled, if any.
    pub stat: Option<Stat>,
    /// The move rolled for, if any.
    pub move_id: Option<String>,
    /// The two die faces.
    pub dice: [u8; 2],
    /// Where the modifier came from.
    pub breakdown: ModifierBreakdown,
    /// The summed modifier.
    pub modifier: i32,
    /// Dice plus modifier.
    pub total: i32,
    /// The outcome tier.
    pub outcome: Outcome,
    /// Whether the roll is hidden from other players.
    pub is_secret: bool,
    /// When the roll was made.
    pub rolled_at: DateTime<Utc>,
}

/// Retrieves a roll. Secret rolls are visible to their roller and admins only.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no roll exists for the ID.
/// Returns `DomainError::Permission` for a secret roll and any other caller.
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub async fn get_roll_by_id(
    roll_id: Uuid,
    caller: &Caller,
    repo: &dyn EventRepository,
) -> Result<RollView, DomainError> {
    let stored_events = repo.load_existing(roll_id).await?;
    let roll = command_handlers::reconstitute(roll_id, &stored_events)?;
    let record = roll
        .record()
        .ok_or(DomainError::AggregateNotFound(roll_id))?;

    if record.is_secret && !caller.is_admin() && caller.user_id != record.user_id {
        return Err(DomainError::Permission(
            "secret rolls are visible to their roller only".to_owned(),
        ));
    }

    Ok(RollView {
        roll_id,
        campaign_id: record.campaign_id,
        scene_id: record.scene_id,
        character_id: record.character_id,
        user_id: record.user_id,
        stat: record.stat,
        move_id: record.move_id.clone(),
        dice: record.dice,
        breakdown: record.breakdown,
        modifier: record.modifier,
        total: record.total,
        outcome: record.outcome,
        is_secret: record.is_secret,
        rolled_at: stored_events[0].occurred_at,
    })
}

#[cfg(test)]
mod tests {
    use loremaster_core::repository::{StoredEvent, to_stored_event};
    use loremaster_test_support::{
        EmptyEventRepository, FixedClock, RecordingEventRepository, fixed_now,
    };

    use super::*;
    use crate::domain::aggregates::{DiceRoll, RollContext};
    use crate::domain::dice::{self, RollInputs, StatBlock};
    use loremaster_core::aggregate::AggregateRoot;
    use loremaster_test_support::SequenceRng;

    fn recorded_roll(roll_id: Uuid, roller: Uuid, is_secret: bool) -> Vec<StoredEvent> {
        let stats = StatBlock::from_pairs([(Stat::Weird, 1)]);
        let computation = dice::roll(
            &RollInputs {
                stats: &stats,
                stat: Some(Stat::Weird),
                situational: 0,
                forward: 0,
                ongoing: 0,
            },
            &mut SequenceRng::new(vec![2, 5]),
        );
        let mut roll = DiceRoll::new(roll_id);
        roll.record_roll(
            RollContext {
                campaign_id: Uuid::new_v4(),
                scene_id: None,
                character_id: Uuid::new_v4(),
                user_id: roller,
                stat: Some(Stat::Weird),
                move_id: Some("open_your_brain".to_owned()),
                is_secret,
            },
            &computation,
            Uuid::new_v4(),
            &FixedClock::default(),
        )
        .unwrap();
        roll.uncommitted_events().iter().map(to_stored_event).collect()
    }

    #[tokio::test]
    async fn test_get_roll_by_id_returns_view() {
        // Arrange
        let roll_id = Uuid::new_v4();
        let roller = Uuid::new_v4();
        let repo = RecordingEventRepository::new()
            .with_stream(roll_id, recorded_roll(roll_id, roller, false));

        // Act
        let view = get_roll_by_id(roll_id, &Caller::player(Uuid::new_v4()), &repo)
            .await
            .unwrap();

        // Assert
        assert_eq!(view.roll_id, roll_id);
        assert_eq!(view.dice, [2, 5]);
        assert_eq!(view.modifier, 1);
        assert_eq!(view.total, 8);
        assert_eq!(view.outcome, Outcome::WeakHit);
        assert_eq!(view.rolled_at, fixed_now());
    }

    #[tokio::test]
    async fn test_secret_roll_hidden_from_other_players() {
        // Arrange
        let roll_id = Uuid::new_v4();
        let roller = Uuid::new_v4();
        let repo = RecordingEventRepository::new()
            .with_stream(roll_id, recorded_roll(roll_id, roller, true));

        // Act
        let other = get_roll_by_id(roll_id, &Caller::player(Uuid::new_v4()), &repo).await;
        let own = get_roll_by_id(roll_id, &Caller::player(roller), &repo).await;
        let gm = get_roll_by_id(roll_id, &Caller::admin(Uuid::new_v4()), &repo).await;

        // Assert
        assert!(matches!(other, Err(DomainError::Permission(_))));
        assert!(own.unwrap().is_secret);
        assert!(gm.is_ok());
    }

    #[tokio::test]
    async fn test_get_roll_by_id_returns_not_found_when_no_events() {
        let roll_id = Uuid::new_v4();

        let result =
            get_roll_by_id(roll_id, &Caller::admin(Uuid::new_v4()), &EmptyEventRepository).await;

        match result.unwrap_err() {
            DomainError::AggregateNotFound(id) => assert_eq!(id, roll_id),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }
}
