//! Aggregate roots for the Campaign context.

use std::collections::{BTreeMap, BTreeSet};

use loremaster_core::aggregate::AggregateRoot;
use loremaster_core::clock::Clock;
use loremaster_core::error::DomainError;
use loremaster_core::event::EventMetadata;
use serde::Serialize;
use uuid::Uuid;

use super::clocks::{ClockDelta, DEFAULT_SEGMENTS, ProgressClock, normalize_segments};
use super::events::{
    CampaignEvent, CampaignEventKind, ClockAdvanced, ClockStarted, SceneClosed, SceneOpened,
};

/// The scene currently occupying the campaign's live slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveScene {
    /// The live scene.
    pub scene_id: Uuid,
    /// Its number within the campaign.
    pub scene_number: u32,
    /// Characters locked into it.
    pub participants: BTreeSet<Uuid>,
}

/// The aggregate root for a campaign's play state.
#[derive(Debug)]
pub struct Campaign {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Current version (event count).
    pub(crate) version: i64,
    pub(crate) next_scene_number: u32,
    pub(crate) live_scene: Option<LiveScene>,
    pub(crate) clocks: BTreeMap<String, ProgressClock>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<CampaignEvent>,
}

impl Campaign {
    /// Creates a campaign that has not played a scene yet.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            next_scene_number: 1,
            live_scene: None,
            clocks: BTreeMap::new(),
            uncommitted_events: Vec::new(),
        }
    }

    /// The scene in the live slot, if any.
    #[must_use]
    pub fn live_scene(&self) -> Option<&LiveScene> {
        self.live_scene.as_ref()
    }

    /// The number the next scene will get.
    #[must_use]
    pub fn next_scene_number(&self) -> u32 {
        self.next_scene_number
    }

    /// The campaign's progress clocks by name.
    #[must_use]
    pub fn clocks(&self) -> &BTreeMap<String, ProgressClock> {
        &self.clocks
    }

    fn push_event(
        &mut self,
        event_type: &str,
        kind: CampaignEventKind,
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
        self.uncommitted_events.push(CampaignEvent { metadata, kind });
    }

    /// Puts a new scene into the live slot and returns its scene number.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Conflict` if a scene is already live or a
    /// participant is locked into another live scene.
    /// Returns `DomainError::Validation` if `participants` is empty.
    pub fn open_scene(
        &mut self,
        scene_id: Uuid,
        participants: &[Uuid],
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<u32, DomainError> {
        if participants.is_empty() {
            return Err(DomainError::Validation(
                "a scene needs at least one participant".into(),
            ));
        }
        if let Some(live) = &self.live_scene {
            if let Some(busy) = participants.iter().find(|p| live.participants.contains(p)) {
                return Err(DomainError::Conflict(format!(
                    "character {busy} is already in live scene {}",
                    live.scene_id
                )));
            }
            return Err(DomainError::Conflict(format!(
                "campaign already has a live scene ({})",
                live.scene_id
            )));
        }
        if !self.uncommitted_events.is_empty() {
            return Err(DomainError::Conflict(
                "campaign already has a scene opening".into(),
            ));
        }

        let mut unique = BTreeSet::new();
        let participants: Vec<Uuid> = participants
            .iter()
            .copied()
            .filter(|p| unique.insert(*p))
            .collect();
        let scene_number = self.next_scene_number;

        self.push_event(
            "campaign.scene_opened",
            CampaignEventKind::SceneOpened(SceneOpened {
                campaign_id: self.id,
                scene_id,
                scene_number,
                participants,
            }),
            correlation_id,
            clock,
        );
        Ok(scene_number)
    }

    /// Frees the live slot if `scene_id` holds it. Returns whether it did.
    pub fn close_scene(&mut self, scene_id: Uuid, correlation_id: Uuid, clock: &dyn Clock) -> bool {
        let holds_slot = self
            .live_scene
            .as_ref()
            .is_some_and(|live| live.scene_id == scene_id);
        if holds_slot {
            self.push_event(
                "campaign.scene_closed",
                CampaignEventKind::SceneClosed(SceneClosed {
                    campaign_id: self.id,
                    scene_id,
                }),
                correlation_id,
                clock,
            );
        }
        holds_slot
    }

    /// Applies clock deltas in order. Unknown clocks are started; fills
    /// are clamped to the clock's segments.
    pub fn apply_clock_deltas(
        &mut self,
        deltas: &[ClockDelta],
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) {
        let mut working = self.clocks.clone();
        for delta in deltas {
            let name = delta.name.trim();
            if name.is_empty() {
                tracing::warn!(campaign_id = %self.id, "ignoring clock delta without a name");
                continue;
            }

            if !working.contains_key(name) {
                let segments = delta
                    .segments
                    .map_or(DEFAULT_SEGMENTS, normalize_segments);
                self.push_event(
                    "campaign.clock_started",
                    CampaignEventKind::ClockStarted(ClockStarted {
                        campaign_id: self.id,
                        name: name.to_owned(),
                        segments,
                    }),
                    correlation_id,
                    clock,
                );
                working.insert(
                    name.to_owned(),
                    ProgressClock {
                        name: name.to_owned(),
                        segments,
                        filled: 0,
                    },
                );
            }

            let Some(current) = working.get_mut(name) else {
                continue;
            };
            let filled = current.advanced_fill(delta.advance);
            if filled != current.filled {
                current.filled = filled;
                self.push_event(
                    "campaign.clock_advanced",
                    CampaignEventKind::ClockAdvanced(ClockAdvanced {
                        campaign_id: self.id,
                        name: name.to_owned(),
                        filled,
                    }),
                    correlation_id,
                    clock,
                );
            }
        }
    }
}

impl AggregateRoot for Campaign {
    type Event = CampaignEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            CampaignEventKind::SceneOpened(e) => {
                self.next_scene_number = e.scene_number + 1;
                self.live_scene = Some(LiveScene {
                    scene_id: e.scene_id,
                    scene_number: e.scene_number,
                    participants: e.participants.iter().copied().collect(),
                });
            }
            CampaignEventKind::SceneClosed(e) => {
                if self
                    .live_scene
                    .as_ref()
                    .is_some_and(|live| live.scene_id == e.scene_id)
                {
                    self.live_scene = None;
                }
            }
            CampaignEventKind::ClockStarted(e) => {
                self.clocks.insert(
                    e.name.clone(),
                    ProgressClock {
                        name: e.name.clone(),
                        segments: e.segments,
                        filled: 0,
                    },
                );
            }
            CampaignEventKind::ClockAdvanced(e) => {
                if let Some(clock) = self.clocks.get_mut(&e.name) {
                    clock.filled = e.filled;
                }
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
