//! Routes for the Campaign context.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::get};
use tracing::instrument;
use uuid::Uuid;

use loremaster_campaign::application::query_handlers;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /{campaign_id}
#[instrument(skip(state))]
async fn get_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<query_handlers::CampaignView>, ApiError> {
    let view = query_handlers::get_campaign_by_id(campaign_id, &*state.event_repository).await?;
    Ok(Json(view))
}

/// Returns the router for the campaign context.
pub fn router() -> Router<AppState> {
    Router::new().route("/{campaign_id}", get(get_campaign))
}
