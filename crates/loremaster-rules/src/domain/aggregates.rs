//! Aggregate roots for the Dice Resolution context.

use loremaster_core::aggregate::AggregateRoot;
use loremaster_core::clock::Clock;
use loremaster_core::error::DomainError;
use loremaster_core::event::EventMetadata;
use uuid::Uuid;

use super::dice::{RollComputation, Stat};
use super::events::{DiceRolled, RulesEvent, RulesEventKind};

/// Who rolled, where, and for what. Paired with a `RollComputation` to
/// record a roll.
#[derive(Debug, Clone)]
pub struct RollContext {
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
    /// The move being rolled for, if any.
    pub move_id: Option<String>,
    /// Whether the roll is hidden from other players.
    pub is_secret: bool,
}

/// The aggregate root for a single dice roll.
#[derive(Debug)]
pub struct DiceRoll {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Current version (event count).
    pub(crate) version: i64,
    /// The recorded roll (set after `DiceRolled`).
    pub(crate) record: Option<DiceRolled>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<RulesEvent>,
}

impl DiceRoll {
    /// Creates an unrecorded roll.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            record: None,
            uncommitted_events: Vec::new(),
        }
    }

    /// Returns the recorded roll, if any.
    #[must_use]
    pub fn record(&self) -> Option<&DiceRolled> {
        self.record.as_ref()
    }

    /// Records the roll, producing a `DiceRolled` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Conflict` if this roll id was already recorded.
    pub fn record_roll(
        &mut self,
        context: RollContext,
        computation: &RollComputation,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.record.is_some() || !self.uncommitted_events.is_empty() {
            return Err(DomainError::Conflict(format!(
                "roll {} has already been recorded",
                self.id
            )));
        }

        let event = RulesEvent {
            metadata: EventMetadata::new(
                "rules.dice_rolled",
                self.id,
                self.next_sequence_number(),
                correlation_id,
                clock,
            ),
            kind: RulesEventKind::DiceRolled(DiceRolled {
                roll_id: self.id,
                campaign_id: context.campaign_id,
                scene_id: context.scene_id,
                character_id: context.character_id,
                user_id: context.user_id,
                stat: context.stat,
                move_id: context.move_id,
                dice: computation.dice,
                breakdown: computation.breakdown,
                modifier: computation.modifier,
                total: computation.total,
                outcome: computation.outcome,
                is_secret: context.is_secret,
            }),
        };

        self.uncommitted_events.push(event);
        Ok(())
    }

    /// Returns the pending `DiceRolled` payload, if `record_roll` succeeded.
    #[must_use]
    pub fn pending_record(&self) -> Option<&DiceRolled> {
        self.uncommitted_events.iter().find_map(|event| match &event.kind {
            RulesEventKind::DiceRolled(payload) => Some(payload),
        })
    }
}

impl AggregateRoot for DiceRoll {
    type Event = RulesEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            RulesEventKind::DiceRolled(payload) => {
                self.record = Some(payload.clone());
            }
        }
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}
