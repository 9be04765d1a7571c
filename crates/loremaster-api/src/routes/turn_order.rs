//! Routes for the Turn Order context.

use axum::extract::{Path, State};
use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use loremaster_turn_order::application::{command_handlers, query_handlers};
use loremaster_turn_order::domain::aggregates::Initiative;
use loremaster_turn_order::domain::commands;

use super::CommandResponse;
use crate::error::ApiError;
use crate::identity::AuthenticatedCaller;
use crate::state::AppState;

/// Request body for POST /start.
#[derive(Debug, Deserialize)]
pub struct StartTurnOrderRequest {
    /// The scene entering combat.
    pub scene_id: Uuid,
    /// Client-chosen tracker id; generated when absent.
    #[serde(default)]
    pub tracker_id: Option<Uuid>,
    /// Participants with their initiative scores.
    pub participants: Vec<Initiative>,
}

/// Request body for POST /end-turn.
#[derive(Debug, Deserialize)]
pub struct EndTurnRequest {
    /// The scene in combat.
    pub scene_id: Uuid,
    /// The character ending their turn.
    pub character_id: Uuid,
}

/// Request body for POST /skip.
#[derive(Debug, Deserialize)]
pub struct SkipTurnRequest {
    /// The scene in combat.
    pub scene_id: Uuid,
    /// Why the current actor is skipped.
    pub reason: String,
}

/// Request body for POST /advance and POST /end.
#[derive(Debug, Deserialize)]
pub struct TurnOrderRequest {
    /// The scene in combat.
    pub scene_id: Uuid,
}

/// POST /start
#[instrument(skip(state, caller, request), fields(scene_id = %request.scene_id))]
async fn start_turn_order(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(request): Json<StartTurnOrderRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::StartTurnOrder {
        correlation_id: Uuid::new_v4(),
        scene_id: request.scene_id,
        tracker_id: request.tracker_id.unwrap_or_else(Uuid::new_v4),
        participants: request.participants,
    };

    info!(
        correlation_id = %command.correlation_id,
        tracker_id = %command.tracker_id,
        "handling start_turn_order command"
    );

    let outcome = command_handlers::handle_start_turn_order(
        &command,
        &caller,
        state.clock.as_ref(),
        &*state.event_repository,
        state.broadcaster.as_ref(),
    )
    .await?;

    Ok(Json(outcome.into()))
}

/// POST /end-turn
#[instrument(
    skip(state, caller, request),
    fields(scene_id = %request.scene_id, character_id = %request.character_id)
)]
async fn end_turn(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(request): Json<EndTurnRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::EndTurn {
        correlation_id: Uuid::new_v4(),
        scene_id: request.scene_id,
        character_id: request.character_id,
    };

    info!(correlation_id = %command.correlation_id, "handling end_turn command");

    let outcome = command_handlers::handle_end_turn(
        &command,
        &caller,
        state.clock.as_ref(),
        &*state.event_repository,
        state.broadcaster.as_ref(),
    )
    .await?;

    Ok(Json(outcome.into()))
}

/// POST /advance
#[instrument(skip(state, caller, request), fields(scene_id = %request.scene_id))]
async fn advance_turn(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(request): Json<TurnOrderRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::AdvanceTurn {
        correlation_id: Uuid::new_v4(),
        scene_id: request.scene_id,
    };

    info!(correlation_id = %command.correlation_id, "handling advance_turn command");

    let outcome = command_handlers::handle_advance_turn(
        &command,
        &caller,
        state.clock.as_ref(),
        &*state.event_repository,
        state.broadcaster.as_ref(),
    )
    .await?;

    Ok(Json(outcome.into()))
}

/// POST /skip
#[instrument(skip(state, caller, request), fields(scene_id = %request.scene_id))]
async fn skip_turn(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(request): Json<SkipTurnRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::SkipTurn {
        correlation_id: Uuid::new_v4(),
        scene_id: request.scene_id,
        reason: request.reason,
    };

    info!(correlation_id = %command.correlation_id, "handling skip_turn command");

    let outcome = command_handlers::handle_skip_turn(
        &command,
        &caller,
        state.clock.as_ref(),
        &*state.event_repository,
        state.broadcaster.as_ref(),
    )
    .await?;

    Ok(Json(outcome.into()))
}

/// POST /end
#[instrument(skip(state, caller, request), fields(scene_id = %request.scene_id))]
async fn end_turn_order(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(request): Json<TurnOrderRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::EndTurnOrder {
        correlation_id: Uuid::new_v4(),
        scene_id: request.scene_id,
    };

    info!(correlation_id = %command.correlation_id, "handling end_turn_order command");

    let outcome = command_handlers::handle_end_turn_order(
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
#[instrument(skip(state))]
async fn get_turn_order(
    State(state): State<AppState>,
    Path(scene_id): Path<Uuid>,
) -> Result<Json<query_handlers::TurnOrderView>, ApiError> {
    let view =
        query_handlers::get_turn_order_by_scene(scene_id, &*state.event_repository).await?;
    Ok(Json(view))
}

/// Returns the router for the turn order context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_turn_order))
        .route("/end-turn", post(end_turn))
        .route("/advance", post(advance_turn))
        .route("/skip", post(skip_turn))
        .route("/end", post(end_turn_order))
        .route("/{scene_id}", get(get_turn_order))
}
