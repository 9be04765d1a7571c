//! Loading support for the Campaign context.
//!
//! The campaign stream is only ever written as part of cross-aggregate
//! batches assembled by the resolution coordinator, so this module only
//! rebuilds the aggregate.

use loremaster_core::aggregate::AggregateRoot;
use loremaster_core::error::DomainError;
use loremaster_core::event::EventMetadata;
use loremaster_core::repository::{EventRepository, StoredEvent};
use uuid::Uuid;

use crate::domain::aggregates::Campaign;
use crate::domain::events::{CampaignEvent, CampaignEventKind};

/// Reconstitutes a `Campaign` from stored events.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub fn reconstitute(
    campaign_id: Uuid,
    existing_events: &[StoredEvent],
) -> Result<Campaign, DomainError> {
    let mut campaign = Campaign::new(campaign_id);
    for stored in existing_events {
        let kind: CampaignEventKind = serde_json::from_value(stored.payload.clone()).map_err(|e| {
            DomainError::Infrastructure(format!("event deserialization failed: {e}"))
        })?;
        campaign.apply(&CampaignEvent {
            metadata: EventMetadata::from_stored(stored),
            kind,
        });
    }
    Ok(campaign)
}

/// Loads a campaign. An empty stream is a campaign with no scenes yet.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if loading or deserialization fails.
pub async fn load_campaign(
    campaign_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<Campaign, DomainError> {
    let existing_events = repo.load_events(campaign_id).await?;
    reconstitute(campaign_id, &existing_events)
}
