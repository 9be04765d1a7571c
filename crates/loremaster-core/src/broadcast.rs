//! Real-time broadcast port.
//!
//! The core publishes after a successful append and never waits on
//! delivery. Transport fan-out (websockets, SSE) lives outside the core.

use serde::Serialize;
use uuid::Uuid;

/// Who may receive a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "user_id", rename_all = "snake_case")]
pub enum Audience {
    /// Every member of the campaign.
    Campaign,
    /// A single user (secret rolls go only to their roller).
    User(Uuid),
}

impl Audience {
    /// Returns `true` if a member with `user_id` may see this broadcast.
    #[must_use]
    pub fn includes(&self, user_id: Uuid) -> bool {
        match self {
            Self::Campaign => true,
            Self::User(target) => *target == user_id,
        }
    }
}

/// The kinds of events the core emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BroadcastKind {
    /// A scene reached `Resolved`, by narration or admin override.
    #[serde(rename = "scene.resolved")]
    SceneResolved,
    /// The turn order changed (started, turn ended, advanced, skipped).
    #[serde(rename = "turnOrder.updated")]
    TurnOrderUpdated,
    /// A turn tracker ended.
    #[serde(rename = "turnOrder.ended")]
    TurnOrderEnded,
    /// A dice roll was recorded.
    #[serde(rename = "dice.rolled")]
    DiceRolled,
}

impl BroadcastKind {
    /// Returns the wire name of the event kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SceneResolved => "scene.resolved",
            Self::TurnOrderUpdated => "turnOrder.updated",
            Self::TurnOrderEnded => "turnOrder.ended",
            Self::DiceRolled => "dice.rolled",
        }
    }
}

/// A single outbound real-time event. Payloads carry public fields only.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastEvent {
    /// The campaign the event belongs to.
    pub campaign_id: Uuid,
    /// Who may receive it.
    pub audience: Audience,
    /// The event kind.
    pub kind: BroadcastKind,
    /// Public event fields.
    pub payload: serde_json::Value,
}

impl BroadcastEvent {
    /// Creates a campaign-wide event.
    #[must_use]
    pub fn to_campaign(
        campaign_id: Uuid,
        kind: BroadcastKind,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            campaign_id,
            audience: Audience::Campaign,
            kind,
            payload,
        }
    }
}

/// Outbound real-time channel.
pub trait Broadcaster: Send + Sync {
    /// Publishes an event. Delivery failures are the transport's concern.
    fn publish(&self, event: BroadcastEvent);
}

/// Broadcaster that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn publish(&self, event: BroadcastEvent) {
        tracing::trace!(kind = event.kind.as_str(), "dropping broadcast");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_audience_excludes_other_users() {
        let roller = Uuid::new_v4();
        let audience = Audience::User(roller);
        assert!(audience.includes(roller));
        assert!(!audience.includes(Uuid::new_v4()));
        assert!(Audience::Campaign.includes(Uuid::new_v4()));
    }

    #[test]
    fn test_kind_serializes_to_wire_name() {
        let json = serde_json::to_value(BroadcastKind::TurnOrderEnded).unwrap();
        assert_eq!(json, "turnOrder.ended");
        assert_eq!(BroadcastKind::SceneResolved.as_str(), "scene.resolved");
    }
}
