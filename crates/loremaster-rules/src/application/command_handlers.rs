//! Command-side helpers for the Dice Resolution context.
//!
//! Rolling touches the character and scene streams too, so the roll
//! handler itself lives with the resolution coordinator. This module owns
//! rebuilding and recording `DiceRoll` streams.

use loremaster_core::aggregate::AggregateRoot;
use loremaster_core::clock::Clock;
use loremaster_core::error::DomainError;
use loremaster_core::event::EventMetadata;
use loremaster_core::repository::{EventRepository, StoredEvent, StreamAppend};
use loremaster_core::rng::DeterministicRng;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::aggregates::{DiceRoll, RollContext};
use crate::domain::dice::{self, RollComputation, RollInputs};
use crate::domain::events::{RulesEvent, RulesEventKind};

/// Reconstitutes a `DiceRoll` from stored events.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub fn reconstitute(
    roll_id: Uuid,
    existing_events: &[StoredEvent],
) -> Result<DiceRoll, DomainError> {
    let mut roll = DiceRoll::new(roll_id);
    for stored in existing_events {
        let kind: RulesEventKind = serde_json::from_value(stored.payload.clone()).map_err(|e| {
            DomainError::Infrastructure(format!("event deserialization failed: {e}"))
        })?;
        roll.apply(&RulesEvent {
            metadata: EventMetadata::from_stored(stored),
            kind,
        });
    }
    Ok(roll)
}

/// Rolls the dice with the shared RNG.
///
/// The `Mutex` is held only for the synchronous draw, never across an await.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the RNG mutex is poisoned.
pub fn draw(
    inputs: &RollInputs<'_>,
    rng: &Mutex<dyn DeterministicRng + Send>,
) -> Result<RollComputation, DomainError> {
    let mut guard = rng
        .lock()
        .map_err(|e| DomainError::Infrastructure(format!("RNG mutex poisoned: {e}")))?;
    Ok(dice::roll(inputs, &mut *guard))
}

/// Loads the roll stream and stages a `DiceRolled` event on it. The caller
/// commits the returned append together with whatever else the roll changes.
///
/// # Errors
///
/// Returns `DomainError::Conflict` if the roll id is already taken.
/// Returns `DomainError::Infrastructure` if loading or deserialization fails.
pub async fn stage_roll(
    roll_id: Uuid,
    context: RollContext,
    computation: &RollComputation,
    correlation_id: Uuid,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<(DiceRoll, StreamAppend), DomainError> {
    let existing_events = repo.load_events(roll_id).await?;
    let mut roll = reconstitute(roll_id, &existing_events)?;
    roll.record_roll(context, computation, correlation_id, clock)?;
    let append = StreamAppend::from_aggregate(&roll);
    Ok((roll, append))
}

#[cfg(test)]
mod tests {
    use loremaster_core::event::DomainEvent;
    use loremaster_core::repository::to_stored_event;
    use loremaster_test_support::{
        EmptyEventRepository, FixedClock, RecordingEventRepository, SequenceRng,
    };

    use super::*;
    use crate::domain::dice::{Outcome, Stat, StatBlock};

    fn context(character_id: Uuid) -> RollContext {
        RollContext {
            campaign_id: Uuid::new_v4(),
            scene_id: None,
            character_id,
            user_id: Uuid::new_v4(),
            stat: Some(Stat::Hard),
            move_id: None,
            is_secret: true,
        }
    }

    #[test]
    fn test_draw_uses_injected_rng() {
        // Arrange
        let stats = StatBlock::from_pairs([(Stat::Hard, 2)]);
        let inputs = RollInputs {
            stats: &stats,
            stat: Some(Stat::Hard),
            situational: 1,
            forward: 0,
            ongoing: 0,
        };
        let rng: Mutex<SequenceRng> = Mutex::new(SequenceRng::new(vec![4, 3]));

        // Act
        let result = draw(&inputs, &rng).unwrap();

        // Assert
        assert_eq!(result.dice, [4, 3]);
        assert_eq!(result.total, 10);
        assert_eq!(result.outcome, Outcome::StrongHit);
    }

    #[tokio::test]
    async fn test_stage_roll_targets_fresh_stream() {
        // Arrange
        let roll_id = Uuid::new_v4();
        let computation = dice::roll(
            &RollInputs {
                stats: &StatBlock::default(),
                stat: None,
                situational: 0,
                forward: 0,
                ongoing: 0,
            },
            &mut SequenceRng::new(vec![1, 1]),
        );

        // Act
        let (roll, append) = stage_roll(
            roll_id,
            context(Uuid::new_v4()),
            &computation,
            Uuid::new_v4(),
            &FixedClock::default(),
            &EmptyEventRepository,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(append.aggregate_id, roll_id);
        assert_eq!(append.expected_version, 0);
        assert_eq!(append.events.len(), 1);
        assert_eq!(append.events[0].event_type, "rules.dice_rolled");
        assert_eq!(append.events[0].payload["DiceRolled"]["outcome"], "miss");
        assert!(roll.pending_record().unwrap().is_secret);
    }

    #[tokio::test]
    async fn test_stage_roll_rejects_reused_roll_id() {
        // Arrange
        let roll_id = Uuid::new_v4();
        let computation = dice::roll(
            &RollInputs {
                stats: &StatBlock::default(),
                stat: None,
                situational: 0,
                forward: 0,
                ongoing: 0,
            },
            &mut SequenceRng::new(vec![6, 6]),
        );
        let mut first = DiceRoll::new(roll_id);
        first
            .record_roll(
                context(Uuid::new_v4()),
                &computation,
                Uuid::new_v4(),
                &FixedClock::default(),
            )
            .unwrap();
        let stored: Vec<StoredEvent> =
            first.uncommitted_events().iter().map(to_stored_event).collect();
        assert_eq!(first.uncommitted_events()[0].event_type(), "rules.dice_rolled");
        let repo = RecordingEventRepository::new().with_stream(roll_id, stored);

        // Act
        let result = stage_roll(
            roll_id,
            context(Uuid::new_v4()),
            &computation,
            Uuid::new_v4(),
            &FixedClock::default(),
            &repo,
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }
}
