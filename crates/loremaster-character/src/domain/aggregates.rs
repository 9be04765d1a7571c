//! Aggregate roots for the Character context.

use std::collections::{BTreeMap, BTreeSet};

use loremaster_core::aggregate::AggregateRoot;
use loremaster_core::clock::Clock;
use loremaster_core::error::DomainError;
use loremaster_core::event::EventMetadata;
use loremaster_rules::domain::dice::StatBlock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    CharacterCreated, CharacterEvent, CharacterEventKind, ForwardConsumed, HoldGranted,
    OngoingCleared, ResolutionDeltasApplied,
};

/// Lowest harm value.
pub const HARM_MIN: i32 = 0;
/// Highest harm value.
pub const HARM_MAX: i32 = 6;

/// Modifiers carried between rolls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holds {
    /// Applied to the next roll only.
    pub forward: i32,
    /// Applied to every roll until cleared.
    pub ongoing: i32,
}

/// A change to one character requested by a scene resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterDelta {
    /// Signed harm change; the result is clamped to `[HARM_MIN, HARM_MAX]`.
    #[serde(default)]
    pub harm: i32,
    /// Conditions to add.
    #[serde(default)]
    pub add_conditions: Vec<String>,
    /// Conditions to remove.
    #[serde(default)]
    pub remove_conditions: Vec<String>,
    /// Signed relationship score changes keyed by the other party.
    #[serde(default)]
    pub relationships: BTreeMap<String, i32>,
}

impl CharacterDelta {
    /// Whether applying this delta can change anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.harm == 0
            && self.add_conditions.is_empty()
            && self.remove_conditions.is_empty()
            && self.relationships.values().all(|change| *change == 0)
    }
}

/// The aggregate root for a character.
#[derive(Debug)]
pub struct Character {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Current version (event count).
    pub(crate) version: i64,
    pub(crate) created: bool,
    pub(crate) campaign_id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) name: String,
    pub(crate) stats: StatBlock,
    pub(crate) harm: i32,
    pub(crate) conditions: BTreeSet<String>,
    pub(crate) holds: Holds,
    pub(crate) relationships: BTreeMap<String, i32>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<CharacterEvent>,
}

impl Character {
    /// Creates an empty character shell for reconstitution.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            created: false,
            campaign_id: Uuid::nil(),
            user_id: Uuid::nil(),
            name: String::new(),
            stats: StatBlock::default(),
            harm: HARM_MIN,
            conditions: BTreeSet::new(),
            holds: Holds::default(),
            relationships: BTreeMap::new(),
            uncommitted_events: Vec::new(),
        }
    }

    /// Whether the character has been created.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.created
    }

    /// The campaign the character plays in.
    #[must_use]
    pub fn campaign_id(&self) -> Uuid {
        self.campaign_id
    }

    /// The owning user.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// The character's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stat block.
    #[must_use]
    pub fn stats(&self) -> &StatBlock {
        &self.stats
    }

    /// Current harm.
    #[must_use]
    pub fn harm(&self) -> i32 {
        self.harm
    }

    /// Current holds.
    #[must_use]
    pub fn holds(&self) -> Holds {
        self.holds
    }

    /// Current conditions.
    #[must_use]
    pub fn conditions(&self) -> &BTreeSet<String> {
        &self.conditions
    }

    /// Current relationship scores.
    #[must_use]
    pub fn relationships(&self) -> &BTreeMap<String, i32> {
        &self.relationships
    }

    fn push_event(
        &mut self,
        event_type: &str,
        kind: CharacterEventKind,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) {
        let metadata = EventMetadata::new(
            event_type,
            self.id,
            self.next_sequence_number(),
            correlation_id,
            clock,
        );
        self.uncommitted_events.push(CharacterEvent { metadata, kind });
    }

    /// Creates the character, producing a `CharacterCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Conflict` if the character already exists.
    /// Returns `DomainError::Validation` if the name is blank.
    pub fn create(
        &mut self,
        campaign_id: Uuid,
        user_id: Uuid,
        name: &str,
        stats: StatBlock,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.created || !self.uncommitted_events.is_empty() {
            return Err(DomainError::Conflict(format!(
                "character {} already exists",
                self.id
            )));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation(
                "character name must not be empty".into(),
            ));
        }

        self.push_event(
            "character.created",
            CharacterEventKind::CharacterCreated(CharacterCreated {
                character_id: self.id,
                campaign_id,
                user_id,
                name: name.to_owned(),
                stats,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Consumes the forward hold for `roll_id` and returns the consumed value.
    /// A zero hold produces no event.
    pub fn consume_forward(
        &mut self,
        roll_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> i32 {
        let amount = self.holds.forward;
        if amount != 0 {
            self.push_event(
                "character.forward_consumed",
                CharacterEventKind::ForwardConsumed(ForwardConsumed {
                    character_id: self.id,
                    roll_id,
                    amount,
                }),
                correlation_id,
                clock,
            );
        }
        amount
    }

    /// Adds to the forward and ongoing holds.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if both amounts are zero.
    pub fn grant_hold(
        &mut self,
        forward: i32,
        ongoing: i32,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if forward == 0 && ongoing == 0 {
            return Err(DomainError::Validation(
                "a hold grant must change forward or ongoing".into(),
            ));
        }
        self.push_event(
            "character.hold_granted",
            CharacterEventKind::HoldGranted(HoldGranted {
                character_id: self.id,
                forward,
                ongoing,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Removes the ongoing hold. No-op when it is already zero.
    pub fn clear_ongoing(&mut self, correlation_id: Uuid, clock: &dyn Clock) {
        if self.holds.ongoing == 0 {
            return;
        }
        self.push_event(
            "character.ongoing_cleared",
            CharacterEventKind::OngoingCleared(OngoingCleared {
                character_id: self.id,
                previous: self.holds.ongoing,
            }),
            correlation_id,
            clock,
        );
    }

    /// Applies a resolution delta. Harm is clamped, never rejected; adding a
    /// condition the character already has (or removing one it lacks) is a
    /// no-op. An effective no-op delta produces no event.
    pub fn apply_delta(
        &mut self,
        scene_id: Uuid,
        delta: &CharacterDelta,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) {
        let harm = self.harm.saturating_add(delta.harm).clamp(HARM_MIN, HARM_MAX);

        let conditions_added: Vec<String> = delta
            .add_conditions
            .iter()
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty() && !self.conditions.contains(c))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let conditions_removed: Vec<String> = delta
            .remove_conditions
            .iter()
            .map(|c| c.trim().to_owned())
            .filter(|c| self.conditions.contains(c))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let relationships: BTreeMap<String, i32> = delta
            .relationships
            .iter()
            .filter(|(_, change)| **change != 0)
            .map(|(other, change)| {
                let current = self.relationships.get(other).copied().unwrap_or(0);
                (other.clone(), current.saturating_add(*change))
            })
            .collect();

        if harm == self.harm
            && conditions_added.is_empty()
            && conditions_removed.is_empty()
            && relationships.is_empty()
        {
            return;
        }

        self.push_event(
            "character.deltas_applied",
            CharacterEventKind::ResolutionDeltasApplied(ResolutionDeltasApplied {
                character_id: self.id,
                scene_id,
                harm,
                conditions_added,
                conditions_removed,
                relationships,
            }),
            correlation_id,
            clock,
        );
    }
}

impl AggregateRoot for Character {
    type Event = CharacterEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            CharacterEventKind::CharacterCreated(e) => {
                self.created = true;
                self.campaign_id = e.campaign_id;
                self.user_id = e.user_id;
                self.name.clone_from(&e.name);
                self.stats = e.stats.clone();
            }
            CharacterEventKind::ForwardConsumed(e) => {
                self.holds.forward = self.holds.forward.saturating_sub(e.amount);
            }
            CharacterEventKind::HoldGranted(e) => {
                self.holds.forward = self.holds.forward.saturating_add(e.forward);
                self.holds.ongoing = self.holds.ongoing.saturating_add(e.ongoing);
            }
            CharacterEventKind::OngoingCleared(_) => {
                self.holds.ongoing = 0;
            }
            CharacterEventKind::ResolutionDeltasApplied(e) => {
                self.harm = e.harm;
                for condition in &e.conditions_removed {
                    self.conditions.remove(condition);
                }
                self.conditions.extend(e.conditions_added.iter().cloned());
                self.relationships
                    .extend(e.relationships.iter().map(|(k, v)| (k.clone(), *v)));
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
