//! Routes for scenes: lifecycle, the action ledger and resolution.

use axum::extract::{Path, State};
use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use loremaster_resolution::application::{coordinator, scene_lifecycle};
use loremaster_resolution::domain::commands as resolution_commands;
use loremaster_scene::application::{command_handlers, query_handlers};
use loremaster_scene::domain::commands as scene_commands;

use super::CommandResponse;
use crate::error::ApiError;
use crate::identity::AuthenticatedCaller;
use crate::state::AppState;

/// Request body for POST /create.
#[derive(Debug, Deserialize)]
pub struct CreateSceneRequest {
    /// Client-chosen id; generated when absent.
    #[serde(default)]
    pub scene_id: Option<Uuid>,
    /// The campaign the scene opens in.
    pub campaign_id: Uuid,
    /// Characters taking part.
    pub participants: Vec<Uuid>,
    /// The GM's framing text.
    #[serde(default)]
    pub intro_text: String,
}

/// Request body for POST /submit-action.
#[derive(Debug, Deserialize)]
pub struct SubmitActionRequest {
    /// The scene to act in.
    pub scene_id: Uuid,
    /// Client-chosen id; generated when absent.
    #[serde(default)]
    pub action_id: Option<Uuid>,
    /// The acting character.
    pub character_id: Uuid,
    /// What the character does.
    pub action_text: String,
    /// A roll backing the action, if any.
    #[serde(default)]
    pub attached_roll_id: Option<Uuid>,
}

/// Request body for POST /resolve and POST /end.
#[derive(Debug, Deserialize)]
pub struct SceneRequest {
    /// The addressed scene.
    pub scene_id: Uuid,
}

/// Response body for POST /resolve.
#[derive(Debug, Serialize)]
pub struct ResolveSceneResponse {
    /// The resolved scene.
    pub scene_id: Uuid,
    /// The attempt that produced the resolution.
    pub attempt: u32,
    /// The narrator's prose.
    pub resolution_text: String,
    /// Whether an active turn tracker was ended with the scene.
    pub tracker_ended: bool,
    /// IDs of every event persisted by the resolution.
    pub event_ids: Vec<Uuid>,
}

/// POST /create
#[instrument(skip(state, caller, request), fields(campaign_id = %request.campaign_id))]
async fn create_scene(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(request): Json<CreateSceneRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = resolution_commands::CreateScene {
        correlation_id: Uuid::new_v4(),
        scene_id: request.scene_id.unwrap_or_else(Uuid::new_v4),
        campaign_id: request.campaign_id,
        participants: request.participants,
        intro_text: request.intro_text,
    };

    info!(
        correlation_id = %command.correlation_id,
        scene_id = %command.scene_id,
        "handling create_scene command"
    );

    let outcome = scene_lifecycle::handle_create_scene(
        &command,
        &caller,
        state.clock.as_ref(),
        &*state.event_repository,
    )
    .await?;

    Ok(Json(outcome.into()))
}

/// POST /submit-action
#[instrument(
    skip(state, caller, request),
    fields(scene_id = %request.scene_id, character_id = %request.character_id)
)]
async fn submit_action(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(request): Json<SubmitActionRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = scene_commands::SubmitAction {
        correlation_id: Uuid::new_v4(),
        scene_id: request.scene_id,
        action_id: request.action_id.unwrap_or_else(Uuid::new_v4),
        character_id: request.character_id,
        action_text: request.action_text,
        attached_roll_id: request.attached_roll_id,
    };

    info!(correlation_id = %command.correlation_id, "handling submit_action command");

    let outcome = command_handlers::handle_submit_action(
        &command,
        &caller,
        state.clock.as_ref(),
        &*state.event_repository,
    )
    .await?;

    Ok(Json(outcome.into()))
}

/// POST /resolve
#[instrument(skip(state, caller, request), fields(scene_id = %request.scene_id))]
async fn resolve_scene(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(request): Json<SceneRequest>,
) -> Result<Json<ResolveSceneResponse>, ApiError> {
    let command = resolution_commands::ResolveScene {
        correlation_id: Uuid::new_v4(),
        scene_id: request.scene_id,
    };

    info!(correlation_id = %command.correlation_id, "handling resolve_scene command");

    let resolution = coordinator::handle_resolve_scene(
        &command,
        &caller,
        &state.settings,
        state.narrator.as_ref(),
        state.clock.as_ref(),
        &*state.event_repository,
        state.broadcaster.as_ref(),
    )
    .await?;

    Ok(Json(ResolveSceneResponse {
        scene_id: command.scene_id,
        attempt: resolution.attempt,
        event_ids: resolution.outcome.event_ids(),
        resolution_text: resolution.resolution_text,
        tracker_ended: resolution.tracker_ended,
    }))
}

/// POST /end
#[instrument(skip(state, caller, request), fields(scene_id = %request.scene_id))]
async fn end_scene(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(request): Json<SceneRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = resolution_commands::EndScene {
        correlation_id: Uuid::new_v4(),
        scene_id: request.scene_id,
    };

    info!(correlation_id = %command.correlation_id, "handling end_scene command");

    let outcome = scene_lifecycle::handle_end_scene(
        &command,
        &caller,
        state.clock.as_ref(),
        &*state.event_repository,
        state.broadcaster.as_ref(),
    )
    .await?;

    Ok(Json(outcome.into()))
}

/// GET /{scene_id}
#[instrument(skip(state, caller))]
async fn get_scene(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(scene_id): Path<Uuid>,
) -> Result<Json<query_handlers::SceneView>, ApiError> {
    let view = query_handlers::get_scene_by_id(scene_id, &caller, &*state.event_repository).await?;
    Ok(Json(view))
}

/// Returns the router for the scene context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_scene))
        .route("/submit-action", post(submit_action))
        .route("/resolve", post(resolve_scene))
        .route("/end", post(end_scene))
        .route("/{scene_id}", get(get_scene))
}
