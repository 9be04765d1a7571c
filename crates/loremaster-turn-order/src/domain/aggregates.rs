//! Aggregate roots for the Turn Order context.

use std::collections::HashSet;

use loremaster_core::aggregate::AggregateRoot;
use loremaster_core::clock::Clock;
use loremaster_core::error::DomainError;
use loremaster_core::event::EventMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    AdvanceCause, TurnAdvanced, TurnOrderEnded, TurnOrderEntry, TurnOrderEvent,
    TurnOrderEventKind, TurnOrderStarted,
};

/// Tracker lifecycle. `Ended` is terminal; a new exchange uses a new tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerPhase {
    /// Not started.
    Inactive,
    /// Turns are being taken.
    Active,
    /// Finished.
    Ended,
}

/// Audit record of a skipped turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRecord {
    /// The skipped character.
    pub character_id: Uuid,
    /// Why.
    pub reason: String,
    /// The round the skip happened in.
    pub round: u32,
}

/// A participant as supplied to `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initiative {
    /// The character.
    pub character_id: Uuid,
    /// Initiative score; higher goes first.
    pub initiative: i32,
}

/// Sorts by initiative descending. The sort is stable, so input order
/// breaks ties.
#[must_use]
pub fn initiative_order(participants: &[Initiative]) -> Vec<TurnOrderEntry> {
    let mut order: Vec<TurnOrderEntry> = participants
        .iter()
        .map(|p| TurnOrderEntry {
            character_id: p.character_id,
            initiative: p.initiative,
            has_acted: false,
        })
        .collect();
    order.sort_by(|a, b| b.initiative.cmp(&a.initiative));
    order
}

/// The aggregate root for a scene's turn tracker.
#[derive(Debug)]
pub struct TurnTracker {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Current version (event count).
    pub(crate) version: i64,
    pub(crate) campaign_id: Uuid,
    pub(crate) scene_id: Uuid,
    pub(crate) order: Vec<TurnOrderEntry>,
    pub(crate) current_turn_index: usize,
    pub(crate) round_number: u32,
    pub(crate) phase: TrackerPhase,
    pub(crate) skips: Vec<SkipRecord>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<TurnOrderEvent>,
}

impl TurnTracker {
    /// Creates an inactive tracker.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            campaign_id: Uuid::nil(),
            scene_id: Uuid::nil(),
            order: Vec::new(),
            current_turn_index: 0,
            round_number: 1,
            phase: TrackerPhase::Inactive,
            skips: Vec::new(),
            uncommitted_events: Vec::new(),
        }
    }

    /// The owning campaign.
    #[must_use]
    pub fn campaign_id(&self) -> Uuid {
        self.campaign_id
    }

    /// The scene the tracker belongs to.
    #[must_use]
    pub fn scene_id(&self) -> Uuid {
        self.scene_id
    }

    /// The lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    /// The initiative order.
    #[must_use]
    pub fn order(&self) -> &[TurnOrderEntry] {
        &self.order
    }

    /// Index of the character whose turn it is.
    #[must_use]
    pub fn current_turn_index(&self) -> usize {
        self.current_turn_index
    }

    /// The current round, starting at 1.
    #[must_use]
    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    /// Skipped turns, oldest first.
    #[must_use]
    pub fn skips(&self) -> &[SkipRecord] {
        &self.skips
    }

    /// The character whose turn it is, while active.
    #[must_use]
    pub fn current_character(&self) -> Option<Uuid> {
        if self.phase != TrackerPhase::Active {
            return None;
        }
        self.order.get(self.current_turn_index).map(|e| e.character_id)
    }

    fn push_event(&mut self, kind: TurnOrderEventKind, correlation_id: Uuid, clock: &dyn Clock) {
        let metadata = EventMetadata::new(
            kind.event_type(),
            self.id,
            self.next_sequence_number(),
            correlation_id,
            clock,
        );
        self.uncommitted_events.push(TurnOrderEvent { metadata, kind });
    }

    fn require_active(&self) -> Result<Uuid, DomainError> {
        if !self.uncommitted_events.is_empty() {
            return Err(DomainError::Conflict(
                "tracker has an unsaved change".into(),
            ));
        }
        self.current_character()
            .ok_or(DomainError::NoActiveTracker(self.scene_id))
    }

    /// Starts the tracker with a stable descending initiative order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Conflict` if the tracker was already started.
    /// Returns `DomainError::Validation` for an empty list or a character
    /// listed twice.
    pub fn start(
        &mut self,
        campaign_id: Uuid,
        scene_id: Uuid,
        participants: &[Initiative],
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.phase != TrackerPhase::Inactive || !self.uncommitted_events.is_empty() {
            return Err(DomainError::Conflict(format!(
                "tracker {} was already started",
                self.id
            )));
        }
        if participants.is_empty() {
            return Err(DomainError::Validation(
                "turn order needs at least one participant".into(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = participants.iter().find(|p| !seen.insert(p.character_id)) {
            return Err(DomainError::Validation(format!(
                "character {} is listed twice",
                dup.character_id
            )));
        }

        self.push_event(
            TurnOrderEventKind::TurnOrderStarted(TurnOrderStarted {
                tracker_id: self.id,
                campaign_id,
                scene_id,
                order: initiative_order(participants),
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Where the pointer goes after the current entry acts: the next
    /// un-acted entry, or index 0 of a new round when none remain.
    fn next_position(&self) -> (usize, u32, bool) {
        let len = self.order.len();
        let next = (1..len)
            .map(|offset| (self.current_turn_index + offset) % len)
            .find(|i| !self.order[*i].has_acted);
        match next {
            Some(index) => (index, self.round_number, false),
            None => (0, self.round_number + 1, true),
        }
    }

    fn advance_with(
        &mut self,
        cause: AdvanceCause,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let from_character_id = self.require_active()?;
        let (current_turn_index, round_number, new_round) = self.next_position();
        self.push_event(
            TurnOrderEventKind::TurnAdvanced(TurnAdvanced {
                from_character_id,
                cause,
                current_turn_index,
                round_number,
                new_round,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Ends `character_id`'s turn. Admins may end the current turn whoever
    /// it belongs to.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotYourTurn` if a player ends someone else's turn.
    /// Returns `DomainError::NoActiveTracker` unless the tracker is active.
    pub fn end_turn(
        &mut self,
        character_id: Uuid,
        by_admin: bool,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let current = self.require_active()?;
        if current != character_id && !by_admin {
            return Err(DomainError::NotYourTurn { current });
        }
        self.advance_with(AdvanceCause::TurnEnded { by_admin }, correlation_id, clock)
    }

    /// Moves to the next turn without an actor check.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NoActiveTracker` unless the tracker is active.
    pub fn advance(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        self.advance_with(AdvanceCause::AdminAdvance, correlation_id, clock)
    }

    /// Skips the current character and records why.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `reason` is blank.
    /// Returns `DomainError::NoActiveTracker` unless the tracker is active.
    pub fn skip(
        &mut self,
        reason: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::Validation("a skip needs a reason".into()));
        }
        self.advance_with(
            AdvanceCause::Skipped {
                reason: reason.to_owned(),
            },
            correlation_id,
            clock,
        )
    }

    /// Ends the tracker. Returns `false` (and produces nothing) if it had
    /// already ended.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NoActiveTracker` if the tracker never started.
    pub fn end(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<bool, DomainError> {
        match self.phase {
            TrackerPhase::Inactive => Err(DomainError::NoActiveTracker(self.scene_id)),
            TrackerPhase::Ended => Ok(false),
            TrackerPhase::Active => {
                self.push_event(
                    TurnOrderEventKind::TurnOrderEnded(TurnOrderEnded {
                        final_round: self.round_number,
                    }),
                    correlation_id,
                    clock,
                );
                Ok(true)
            }
        }
    }
}

impl AggregateRoot for TurnTracker {
    type Event = TurnOrderEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            TurnOrderEventKind::TurnOrderStarted(e) => {
                self.campaign_id = e.campaign_id;
                self.scene_id = e.scene_id;
                self.order.clone_from(&e.order);
                self.current_turn_index = 0;
                self.round_number = 1;
                self.phase = TrackerPhase::Active;
            }
            TurnOrderEventKind::TurnAdvanced(e) => {
                if let AdvanceCause::Skipped { reason } = &e.cause {
                    self.skips.push(SkipRecord {
                        character_id: e.from_character_id,
                        reason: reason.clone(),
                        round: self.round_number,
                    });
                }
                if e.new_round {
                    for entry in &mut self.order {
                        entry.has_acted = false;
                    }
                } else if let Some(entry) = self
                    .order
                    .iter_mut()
                    .find(|entry| entry.character_id == e.from_character_id)
                {
                    entry.has_acted = true;
                }
                self.current_turn_index = e.current_turn_index;
                self.round_number = e.round_number;
            }
            TurnOrderEventKind::TurnOrderEnded(_) => {
                self.phase = TrackerPhase::Ended;
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

#[cfg(test)]
mod tests {
    use loremaster_test_support::FixedClock;

    use super::*;

    fn commit(tracker: &mut TurnTracker) {
        let pending = tracker.uncommitted_events().to_vec();
        tracker.clear_uncommitted_events();
        for event in &pending {
            tracker.apply(event);
        }
    }

    fn started(participants: &[Initiative]) -> TurnTracker {
        let mut tracker = TurnTracker::new(Uuid::new_v4());
        tracker
            .start(
                Uuid::new_v4(),
                Uuid::new_v4(),
                participants,
                Uuid::new_v4(),
                &FixedClock::default(),
            )
            .unwrap();
        commit(&mut tracker);
        tracker
    }

    fn entry(character_id: Uuid, initiative: i32) -> Initiative {
        Initiative {
            character_id,
            initiative,
        }
    }

    #[test]
    fn test_start_sorts_descending_with_stable_ties() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let tracker = started(&[entry(a, 5), entry(b, 9), entry(c, 9)]);

        let order: Vec<Uuid> = tracker.order().iter().map(|e| e.character_id).collect();
        assert_eq!(order, vec![b, c, a]);
        assert_eq!(tracker.round_number(), 1);
        assert_eq!(tracker.current_turn_index(), 0);
        assert_eq!(tracker.phase(), TrackerPhase::Active);
        assert!(tracker.order().iter().all(|e| !e.has_acted));
    }

    #[test]
    fn test_start_validation() {
        let a = Uuid::new_v4();
        let mut empty = TurnTracker::new(Uuid::new_v4());
        let mut duplicated = TurnTracker::new(Uuid::new_v4());
        let clock = FixedClock::default();

        assert!(matches!(
            empty.start(Uuid::new_v4(), Uuid::new_v4(), &[], Uuid::new_v4(), &clock),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            duplicated.start(
                Uuid::new_v4(),
                Uuid::new_v4(),
                &[entry(a, 1), entry(a, 2)],
                Uuid::new_v4(),
                &clock,
            ),
            Err(DomainError::Validation(_))
        ));

        let mut tracker = started(&[entry(a, 1)]);
        assert!(matches!(
            tracker.start(Uuid::new_v4(), Uuid::new_v4(), &[entry(a, 1)], Uuid::new_v4(), &clock),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn test_end_turn_rejects_other_players() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut tracker = started(&[entry(a, 3), entry(b, 1)]);
        let clock = FixedClock::default();

        let result = tracker.end_turn(b, false, Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::NotYourTurn { current }) if current == a));
        tracker.end_turn(b, true, Uuid::new_v4(), &clock).unwrap();
        commit(&mut tracker);
        assert_eq!(tracker.current_character(), Some(b));
    }

    #[test]
    fn test_round_rolls_over_after_everyone_acts() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut tracker = started(&[entry(a, 3), entry(b, 2), entry(c, 1)]);
        let clock = FixedClock::default();

        for expected in [a, b] {
            tracker.end_turn(expected, false, Uuid::new_v4(), &clock).unwrap();
            commit(&mut tracker);
        }
        assert_eq!(tracker.current_character(), Some(c));
        assert!(tracker.order()[0].has_acted && tracker.order()[1].has_acted);

        tracker.end_turn(c, false, Uuid::new_v4(), &clock).unwrap();
        commit(&mut tracker);

        assert_eq!(tracker.round_number(), 2);
        assert_eq!(tracker.current_turn_index(), 0);
        assert!(tracker.order().iter().all(|e| !e.has_acted));
    }

    #[test]
    fn test_skip_records_audit_and_advances() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut tracker = started(&[entry(a, 3), entry(b, 1)]);
        let clock = FixedClock::default();

        assert!(matches!(
            tracker.skip("  ", Uuid::new_v4(), &clock),
            Err(DomainError::Validation(_))
        ));
        tracker.skip("unconscious", Uuid::new_v4(), &clock).unwrap();
        commit(&mut tracker);

        assert_eq!(tracker.current_character(), Some(b));
        assert_eq!(
            tracker.skips(),
            &[SkipRecord {
                character_id: a,
                reason: "unconscious".into(),
                round: 1,
            }]
        );
    }

    #[test]
    fn test_single_participant_rolls_every_turn() {
        let a = Uuid::new_v4();
        let mut tracker = started(&[entry(a, 0)]);
        let clock = FixedClock::default();

        tracker.advance(Uuid::new_v4(), &clock).unwrap();
        commit(&mut tracker);

        assert_eq!(tracker.round_number(), 2);
        assert_eq!(tracker.current_character(), Some(a));
    }

    #[test]
    fn test_end_is_idempotent_and_stops_turns() {
        let a = Uuid::new_v4();
        let mut tracker = started(&[entry(a, 0)]);
        let clock = FixedClock::default();

        assert!(tracker.end(Uuid::new_v4(), &clock).unwrap());
        commit(&mut tracker);
        assert!(!tracker.end(Uuid::new_v4(), &clock).unwrap());
        assert!(tracker.uncommitted_events().is_empty());
        assert!(matches!(
            tracker.advance(Uuid::new_v4(), &clock),
            Err(DomainError::NoActiveTracker(_))
        ));
    }
}
