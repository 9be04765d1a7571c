//! Routes for the Character context.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use loremaster_character::application::{command_handlers, query_handlers};
use loremaster_character::domain::commands;

use super::CommandResponse;
use crate::error::ApiError;
use crate::identity::AuthenticatedCaller;
use crate::state::AppState;

/// Request body for POST /create.
#[derive(Debug, Deserialize)]
pub struct CreateCharacterRequest {
    /// Client-chosen id; generated when absent.
    #[serde(default)]
    pub character_id: Option<Uuid>,
    /// The campaign the character plays in.
    pub campaign_id: Uuid,
    /// The owning user; defaults to the caller.
    #[serde(default)]
    pub user_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Stat values keyed by stat name. Unknown keys are ignored.
    #[serde(default)]
    pub stats: BTreeMap<String, i32>,
}

/// Request body for POST /grant-hold.
#[derive(Debug, Deserialize)]
pub struct GrantHoldRequest {
    /// The character receiving the hold.
    pub character_id: Uuid,
    /// One-shot bonus for the next roll.
    #[serde(default)]
    pub forward: i32,
    /// Standing bonus until cleared.
    #[serde(default)]
    pub ongoing: i32,
}

/// Request body for POST /clear-ongoing.
#[derive(Debug, Deserialize)]
pub struct ClearOngoingRequest {
    /// The character whose ongoing hold is cleared.
    pub character_id: Uuid,
}

/// POST /create
#[instrument(skip(state, caller, request), fields(campaign_id = %request.campaign_id))]
async fn create_character(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(request): Json<CreateCharacterRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::CreateCharacter {
        correlation_id: Uuid::new_v4(),
        character_id: request.character_id.unwrap_or_else(Uuid::new_v4),
        campaign_id: request.campaign_id,
        user_id: request.user_id.unwrap_or(caller.user_id),
        name: request.name,
        stats: request.stats,
    };

    info!(correlation_id = %command.correlation_id, "handling create_character command");

    let outcome = command_handlers::handle_create_character(
        &command,
        &caller,
        state.clock.as_ref(),
        &*state.event_repository,
    )
    .await?;

    Ok(Json(outcome.into()))
}

/// POST /grant-hold
#[instrument(skip(state, caller, request), fields(character_id = %request.character_id))]
async fn grant_hold(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(request): Json<GrantHoldRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::GrantHold {
        correlation_id: Uuid::new_v4(),
        character_id: request.character_id,
        forward: request.forward,
        ongoing: request.ongoing,
    };

    info!(correlation_id = %command.correlation_id, "handling grant_hold command");

    let outcome = command_handlers::handle_grant_hold(
        &command,
        &caller,
        state.clock.as_ref(),
        &*state.event_repository,
    )
    .await?;

    Ok(Json(outcome.into()))
}

/// POST /clear-ongoing
#[instrument(skip(state, caller, request), fields(character_id = %request.character_id))]
async fn clear_ongoing(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(request): Json<ClearOngoingRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::ClearOngoing {
        correlation_id: Uuid::new_v4(),
        character_id: request.character_id,
    };

    info!(correlation_id = %command.correlation_id, "handling clear_ongoing command");

    let outcome = command_handlers::handle_clear_ongoing(
        &command,
        &caller,
        state.clock.as_ref(),
        &*state.event_repository,
    )
    .await?;

    Ok(Json(outcome.into()))
}

/// GET /{character_id}
#[instrument(skip(state))]
async fn get_character(
    State(state): State<AppState>,
    Path(character_id): Path<Uuid>,
) -> Result<Json<query_handlers::CharacterView>, ApiError> {
    let view = query_handlers::get_character_by_id(character_id, &*state.event_repository).await?;
    Ok(Json(view))
}

/// Returns the router for the character context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_character))
        .route("/grant-hold", post(grant_hold))
        .route("/clear-ongoing", post(clear_ongoing))
        .route("/{character_id}", get(get_character))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::StatusCode;
    use loremaster_core::identity::Caller;
    use serde_json::json;

    use crate::routes::testing::{harness, send};

    #[tokio::test]
    async fn test_create_then_get_character() {
        // Arrange
        let h = harness();
        let owner = Uuid::new_v4();
        let campaign_id = Uuid::new_v4();
        let body = json!({
            "campaign_id": campaign_id,
            "name": "Vesper",
            "stats": { "cool": 2, "weird": -1 }
        });

        // Act
        let (status, created) = send(
            router().with_state(h.state.clone()),
            "POST",
            "/create",
            Some(Caller::player(owner)),
            Some(&body),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["event_ids"].as_array().unwrap().len(), 1);
        let character_id = created["aggregate_id"].as_str().unwrap().to_owned();

        let (status, json) = send(
            router().with_state(h.state),
            "GET",
            &format!("/{character_id}"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "Vesper");
        assert_eq!(json["user_id"], owner.to_string());
        assert_eq!(json["stats"]["cool"], 2);
        assert_eq!(json["harm"], 0);
    }

    #[tokio::test]
    async fn test_create_without_identity_returns_401() {
        let h = harness();
        let body = json!({ "campaign_id": Uuid::new_v4(), "name": "Nobody" });

        let (status, json) = send(
            router().with_state(h.state),
            "POST",
            "/create",
            None,
            Some(&body),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "unauthenticated");
    }

    #[tokio::test]
    async fn test_player_cannot_grant_hold() {
        // Arrange
        let h = harness();
        let owner = Uuid::new_v4();
        let character_id =
            crate::routes::testing::seed_character(&h.repo, Uuid::new_v4(), owner, "Ash").await;

        // Act
        let (status, json) = send(
            router().with_state(h.state),
            "POST",
            "/grant-hold",
            Some(Caller::player(owner)),
            Some(&json!({ "character_id": character_id, "forward": 1 })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "permission_denied");
    }

    #[tokio::test]
    async fn test_get_unknown_character_returns_404() {
        let h = harness();

        let (status, json) = send(
            router().with_state(h.state),
            "GET",
            &format!("/{}", Uuid::new_v4()),
            None,
            None,
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "aggregate_not_found");
    }
}
