//! Query handlers for the Campaign context.

use loremaster_core::error::DomainError;
use loremaster_core::repository::EventRepository;
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers;
use crate::domain::aggregates::LiveScene;
use crate::domain::clocks::ProgressClock;

/// Read-only view of a campaign's play state.
#[derive(Debug, Serialize)]
pub struct CampaignView {
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// The scene in the live slot, if any.
    pub live_scene: Option<LiveScene>,
    /// Number of scenes opened so far.
    pub scenes_played: u32,
    /// Progress clocks, sorted by name.
    pub clocks: Vec<ProgressClock>,
    /// Current version (event count).
    pub version: i64,
}

/// Retrieves a campaign's play state. Unplayed campaigns yield an empty view.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if loading or deserialization fails.
pub async fn get_campaign_by_id(
    campaign_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<CampaignView, DomainError> {
    let campaign = command_handlers::load_campaign(campaign_id, repo).await?;
    Ok(CampaignView {
        campaign_id,
        live_scene: campaign.live_scene.clone(),
        scenes_played: campaign.next_scene_number - 1,
        clocks: campaign.clocks.values().cloned().collect(),
        version: campaign.version,
    })
}
