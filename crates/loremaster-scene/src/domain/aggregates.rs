//! Aggregate roots for the Scene context.

use chrono::Duration;
use loremaster_core::aggregate::AggregateRoot;
use loremaster_core::clock::Clock;
use loremaster_core::error::DomainError;
use loremaster_core::event::EventMetadata;
use uuid::Uuid;

use super::events::{
    ActionSubmitted, NarrationFailed, ResolutionBegan, ResolutionCompleted, ResolutionRetried,
    RollAttached, SceneCreated, SceneEndedByAdmin, SceneEvent, SceneEventKind, TrackerAttached,
    TrackerDetached,
};
use super::ledger::{
    ActionStatus, ClosedBy, MAX_ACTION_TEXT_CHARS, PlayerAction, ResolutionAttempt, RollSummary,
    SceneStatus,
};

/// The aggregate root for a scene.
#[derive(Debug)]
pub struct Scene {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Current version (event count).
    pub(crate) version: i64,
    pub(crate) created: bool,
    pub(crate) campaign_id: Uuid,
    pub(crate) scene_number: u32,
    pub(crate) status: SceneStatus,
    pub(crate) participants: Vec<Uuid>,
    pub(crate) intro_text: String,
    pub(crate) resolution_text: Option<String>,
    pub(crate) actions: Vec<PlayerAction>,
    pub(crate) rolls: Vec<RollSummary>,
    pub(crate) active_tracker_id: Option<Uuid>,
    pub(crate) last_tracker_id: Option<Uuid>,
    pub(crate) resolution_attempt: Option<ResolutionAttempt>,
    pub(crate) last_failure: Option<String>,
    pub(crate) closed_by: Option<ClosedBy>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<SceneEvent>,
}

impl Scene {
    /// Creates an empty scene shell for reconstitution.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            created: false,
            campaign_id: Uuid::nil(),
            scene_number: 0,
            status: SceneStatus::AwaitingActions,
            participants: Vec::new(),
            intro_text: String::new(),
            resolution_text: None,
            actions: Vec::new(),
            rolls: Vec::new(),
            active_tracker_id: None,
            last_tracker_id: None,
            resolution_attempt: None,
            last_failure: None,
            closed_by: None,
            uncommitted_events: Vec::new(),
        }
    }

    /// Whether the scene has been created.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.created
    }

    /// The owning campaign.
    #[must_use]
    pub fn campaign_id(&self) -> Uuid {
        self.campaign_id
    }

    /// Number within the campaign.
    #[must_use]
    pub fn scene_number(&self) -> u32 {
        self.scene_number
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> SceneStatus {
        self.status
    }

    /// Participating characters.
    #[must_use]
    pub fn participants(&self) -> &[Uuid] {
        &self.participants
    }

    /// Whether `character_id` takes part in the scene.
    #[must_use]
    pub fn is_participant(&self, character_id: Uuid) -> bool {
        self.participants.contains(&character_id)
    }

    /// The GM's framing text.
    #[must_use]
    pub fn intro_text(&self) -> &str {
        &self.intro_text
    }

    /// The action ledger, in submission order.
    #[must_use]
    pub fn actions(&self) -> &[PlayerAction] {
        &self.actions
    }

    /// Rolls made in the scene, secret ones included.
    #[must_use]
    pub fn rolls(&self) -> &[RollSummary] {
        &self.rolls
    }

    /// The active turn tracker, if any.
    #[must_use]
    pub fn active_tracker_id(&self) -> Option<Uuid> {
        self.active_tracker_id
    }

    /// The most recently attached tracker, active or not.
    #[must_use]
    pub fn last_tracker_id(&self) -> Option<Uuid> {
        self.last_tracker_id
    }

    /// The current resolution attempt, if resolution has begun.
    #[must_use]
    pub fn resolution_attempt(&self) -> Option<ResolutionAttempt> {
        self.resolution_attempt
    }

    /// The narrator failure behind the most recent failed attempt.
    #[must_use]
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    fn push_event(&mut self, kind: SceneEventKind, correlation_id: Uuid, clock: &dyn Clock) {
        let metadata = EventMetadata::new(
            kind.event_type(),
            self.id,
            self.next_sequence_number(),
            correlation_id,
            clock,
        );
        self.uncommitted_events.push(SceneEvent { metadata, kind });
    }

    fn require_awaiting_actions(&self, operation: &str) -> Result<(), DomainError> {
        match self.status {
            SceneStatus::AwaitingActions => Ok(()),
            other => Err(DomainError::InvalidState(format!(
                "cannot {operation}: scene {} is {}",
                self.id,
                other.as_str()
            ))),
        }
    }

    /// Creates the scene, producing a `SceneCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Conflict` if the scene already exists.
    /// Returns `DomainError::Validation` if there are no participants.
    pub fn create(
        &mut self,
        campaign_id: Uuid,
        scene_number: u32,
        participants: Vec<Uuid>,
        intro_text: String,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.created || !self.uncommitted_events.is_empty() {
            return Err(DomainError::Conflict(format!(
                "scene {} already exists",
                self.id
            )));
        }
        if participants.is_empty() {
            return Err(DomainError::Validation(
                "a scene needs at least one participant".into(),
            ));
        }
        let mut participants = participants;
        let mut seen = std::collections::HashSet::new();
        participants.retain(|p| seen.insert(*p));

        self.push_event(
            SceneEventKind::SceneCreated(SceneCreated {
                scene_id: self.id,
                campaign_id,
                scene_number,
                participants,
                intro_text,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Appends an action to the ledger and returns its id.
    ///
    /// Ownership of the character is checked by the caller; this method
    /// enforces the scene-side guards.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` unless the scene is awaiting actions.
    /// Returns `DomainError::Validation` for blank or oversized text, a
    /// non-participant, or an attached roll that is not this character's
    /// roll in this scene.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_action(
        &mut self,
        action_id: Uuid,
        character_id: Uuid,
        user_id: Uuid,
        action_text: &str,
        attached_roll_id: Option<Uuid>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Uuid, DomainError> {
        self.require_awaiting_actions("submit an action")?;

        let action_text = action_text.trim();
        if action_text.is_empty() {
            return Err(DomainError::Validation("action text must not be blank".into()));
        }
        if action_text.chars().count() > MAX_ACTION_TEXT_CHARS {
            return Err(DomainError::Validation(format!(
                "action text exceeds {MAX_ACTION_TEXT_CHARS} characters"
            )));
        }
        if !self.is_participant(character_id) {
            return Err(DomainError::Validation(format!(
                "character {character_id} is not a participant of scene {}",
                self.id
            )));
        }
        if self.actions.iter().any(|a| a.action_id == action_id) {
            return Err(DomainError::Conflict(format!(
                "action {action_id} was already submitted"
            )));
        }
        if let Some(roll_id) = attached_roll_id {
            let owns_roll = self
                .rolls
                .iter()
                .any(|r| r.roll_id == roll_id && r.character_id == character_id);
            if !owns_roll {
                return Err(DomainError::Validation(format!(
                    "roll {roll_id} was not made by this character in this scene"
                )));
            }
        }

        self.push_event(
            SceneEventKind::ActionSubmitted(ActionSubmitted {
                action: PlayerAction {
                    action_id,
                    scene_id: self.id,
                    character_id,
                    user_id,
                    action_text: action_text.to_owned(),
                    status: ActionStatus::Pending,
                    attached_roll_id,
                    submitted_at: clock.now(),
                },
            }),
            correlation_id,
            clock,
        );
        Ok(action_id)
    }

    /// Records a roll made in the scene.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` unless the scene is awaiting actions.
    /// Returns `DomainError::Validation` if the roller is not a participant.
    pub fn attach_roll(
        &mut self,
        roll: RollSummary,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.require_awaiting_actions("roll")?;
        if !self.is_participant(roll.character_id) {
            return Err(DomainError::Validation(format!(
                "character {} is not a participant of scene {}",
                roll.character_id, self.id
            )));
        }
        self.push_event(
            SceneEventKind::RollAttached(RollAttached { roll }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// First resolution attempt: `AwaitingActions → Resolving`, attempt 1
    /// in flight. Returns the attempt number.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AlreadyResolving` if resolution has begun.
    /// Returns `DomainError::InvalidState` if the scene is resolved.
    /// Returns `DomainError::EmptyLedger` if no actions were submitted.
    pub fn begin_resolution(
        &mut self,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<u32, DomainError> {
        match self.status {
            SceneStatus::AwaitingActions => {}
            SceneStatus::Resolving => return Err(DomainError::AlreadyResolving(self.id)),
            SceneStatus::Resolved => {
                return Err(DomainError::InvalidState(format!(
                    "scene {} is already resolved",
                    self.id
                )));
            }
        }
        if self.actions.is_empty() {
            return Err(DomainError::EmptyLedger(self.id));
        }

        self.push_event(
            SceneEventKind::ResolutionBegan(ResolutionBegan {
                attempt: 1,
                started_at: clock.now(),
            }),
            correlation_id,
            clock,
        );
        Ok(1)
    }

    /// Re-enters resolution after a narrator failure: compare-and-set on
    /// the attempt marker. An in-flight attempt older than `stale_after`
    /// counts as abandoned. Returns the new attempt number.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AlreadyResolving` if a fresh attempt is in flight.
    /// Returns `DomainError::InvalidState` unless the scene is resolving.
    pub fn retry_resolution(
        &mut self,
        stale_after: Duration,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<u32, DomainError> {
        if self.status != SceneStatus::Resolving {
            return Err(DomainError::InvalidState(format!(
                "cannot retry resolution: scene {} is {}",
                self.id,
                self.status.as_str()
            )));
        }
        let current = self.resolution_attempt.ok_or_else(|| {
            DomainError::Infrastructure(format!(
                "scene {} is resolving without an attempt",
                self.id
            ))
        })?;
        if current.in_flight && clock.elapsed_since(current.started_at) < stale_after {
            return Err(DomainError::AlreadyResolving(self.id));
        }
        if current.in_flight {
            tracing::warn!(
                scene_id = %self.id,
                attempt = current.attempt,
                "superseding stale resolution attempt"
            );
        }

        let attempt = current.attempt + 1;
        self.push_event(
            SceneEventKind::ResolutionRetried(ResolutionRetried {
                attempt,
                started_at: clock.now(),
                superseded_in_flight: current.in_flight,
            }),
            correlation_id,
            clock,
        );
        Ok(attempt)
    }

    /// Records a narrator failure for `attempt`, clearing the in-flight
    /// marker. The scene stays `Resolving`. A failure reported by an attempt
    /// that has since been superseded is dropped; returns whether an event
    /// was produced.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` unless the scene is resolving.
    pub fn record_narration_failure(
        &mut self,
        attempt: u32,
        reason: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, DomainError> {
        if self.status != SceneStatus::Resolving {
            return Err(DomainError::InvalidState(format!(
                "cannot record a narration failure: scene {} is {}",
                self.id,
                self.status.as_str()
            )));
        }
        let current = self.resolution_attempt;
        if !current.is_some_and(|a| a.attempt == attempt && a.in_flight) {
            return Ok(false);
        }
        self.push_event(
            SceneEventKind::NarrationFailed(NarrationFailed {
                attempt,
                reason: reason.to_owned(),
            }),
            correlation_id,
            clock,
        );
        Ok(true)
    }

    /// Completes resolution for `attempt`: `Resolving → Resolved`, every
    /// ledger action marked resolved.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` unless the scene is resolving.
    /// Returns `DomainError::AlreadyResolving` if `attempt` is no longer the
    /// in-flight attempt.
    pub fn complete_resolution(
        &mut self,
        attempt: u32,
        resolution_text: String,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.status != SceneStatus::Resolving {
            return Err(DomainError::InvalidState(format!(
                "cannot complete resolution: scene {} is {}",
                self.id,
                self.status.as_str()
            )));
        }
        if !self
            .resolution_attempt
            .is_some_and(|a| a.attempt == attempt && a.in_flight)
        {
            return Err(DomainError::AlreadyResolving(self.id));
        }

        let resolved_action_ids = self.actions.iter().map(|a| a.action_id).collect();
        self.push_event(
            SceneEventKind::ResolutionCompleted(ResolutionCompleted {
                attempt,
                resolution_text,
                resolved_action_ids,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Forces the scene to `Resolved` without narration.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the scene is already resolved.
    pub fn end_by_admin(
        &mut self,
        ended_by: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.status == SceneStatus::Resolved {
            return Err(DomainError::InvalidState(format!(
                "scene {} is already resolved",
                self.id
            )));
        }
        self.push_event(
            SceneEventKind::SceneEndedByAdmin(SceneEndedByAdmin {
                ended_by,
                previous_status: self.status,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Attaches a new turn tracker.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Conflict` if a tracker is already active.
    /// Returns `DomainError::InvalidState` unless the scene is awaiting actions.
    pub fn attach_tracker(
        &mut self,
        tracker_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if let Some(active) = self.active_tracker_id {
            return Err(DomainError::Conflict(format!(
                "tracker already active ({active})"
            )));
        }
        self.require_awaiting_actions("start a turn tracker")?;
        self.push_event(
            SceneEventKind::TrackerAttached(TrackerAttached { tracker_id }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Detaches the tracker if it is the active one. Returns whether it was.
    pub fn detach_tracker(
        &mut self,
        tracker_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> bool {
        if self.active_tracker_id != Some(tracker_id) {
            return false;
        }
        self.push_event(
            SceneEventKind::TrackerDetached(TrackerDetached { tracker_id }),
            correlation_id,
            clock,
        );
        true
    }
}

impl AggregateRoot for Scene {
    type Event = SceneEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            SceneEventKind::SceneCreated(e) => {
                self.created = true;
                self.campaign_id = e.campaign_id;
                self.scene_number = e.scene_number;
                self.participants.clone_from(&e.participants);
                self.intro_text.clone_from(&e.intro_text);
                self.status = SceneStatus::AwaitingActions;
            }
            SceneEventKind::ActionSubmitted(e) => {
                self.actions.push(e.action.clone());
            }
            SceneEventKind::RollAttached(e) => {
                self.rolls.push(e.roll.clone());
            }
            SceneEventKind::ResolutionBegan(e) => {
                self.status = SceneStatus::Resolving;
                self.resolution_attempt = Some(ResolutionAttempt {
                    attempt: e.attempt,
                    in_flight: true,
                    started_at: e.started_at,
                });
            }
            SceneEventKind::ResolutionRetried(e) => {
                self.resolution_attempt = Some(ResolutionAttempt {
                    attempt: e.attempt,
                    in_flight: true,
                    started_at: e.started_at,
                });
            }
            SceneEventKind::NarrationFailed(e) => {
                if let Some(attempt) = self.resolution_attempt.as_mut() {
                    if attempt.attempt == e.attempt {
                        attempt.in_flight = false;
                    }
                }
                self.last_failure = Some(e.reason.clone());
            }
            SceneEventKind::ResolutionCompleted(e) => {
                self.status = SceneStatus::Resolved;
                self.resolution_text = Some(e.resolution_text.clone());
                self.closed_by = Some(ClosedBy::Narration);
                for action in &mut self.actions {
                    if e.resolved_action_ids.contains(&action.action_id) {
                        action.status = ActionStatus::Resolved;
                    }
                }
                if let Some(attempt) = self.resolution_attempt.as_mut() {
                    attempt.in_flight = false;
                }
            }
            SceneEventKind::SceneEndedByAdmin(_) => {
                self.status = SceneStatus::Resolved;
                self.closed_by = Some(ClosedBy::AdminOverride);
                if let Some(attempt) = self.resolution_attempt.as_mut() {
                    attempt.in_flight = false;
                }
            }
            SceneEventKind::TrackerAttached(e) => {
                self.active_tracker_id = Some(e.tracker_id);
                self.last_tracker_id = Some(e.tracker_id);
            }
            SceneEventKind::TrackerDetached(e) => {
                if self.active_tracker_id == Some(e.tracker_id) {
                    self.active_tracker_id = None;
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
