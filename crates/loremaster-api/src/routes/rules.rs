//! Routes for dice rolls.

use axum::extract::{Path, State};
use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use loremaster_resolution::application::rolls;
use loremaster_resolution::domain::commands::RollDice;
use loremaster_rules::application::query_handlers;
use loremaster_rules::domain::events::DiceRolled;

use crate::error::ApiError;
use crate::identity::AuthenticatedCaller;
use crate::state::AppState;

/// Request body for POST /roll.
#[derive(Debug, Deserialize)]
pub struct RollDiceRequest {
    /// Client-chosen id; generated when absent. Reusing an id is a conflict.
    #[serde(default)]
    pub roll_id: Option<Uuid>,
    /// The rolling character.
    pub character_id: Uuid,
    /// The scene the roll belongs to, if any.
    #[serde(default)]
    pub scene_id: Option<Uuid>,
    /// The stat to add. Unknown keys roll with a zero stat.
    #[serde(default)]
    pub stat: Option<String>,
    /// Situational modifiers, summed.
    #[serde(default)]
    pub situational_modifiers: Vec<i32>,
    /// The move being rolled for.
    #[serde(default)]
    pub move_id: Option<String>,
    /// Hide the roll from other players.
    #[serde(default)]
    pub is_secret: bool,
}

/// Response body for POST /roll.
#[derive(Debug, Serialize)]
pub struct RollDiceResponse {
    /// The roll as stored.
    #[serde(flatten)]
    pub roll: DiceRolled,
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

/// POST /roll
#[instrument(skip(state, caller, request), fields(character_id = %request.character_id))]
async fn roll_dice(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(request): Json<RollDiceRequest>,
) -> Result<Json<RollDiceResponse>, ApiError> {
    let command = RollDice {
        correlation_id: Uuid::new_v4(),
        roll_id: request.roll_id.unwrap_or_else(Uuid::new_v4),
        character_id: request.character_id,
        scene_id: request.scene_id,
        stat: request.stat,
        situational_modifiers: request.situational_modifiers,
        move_id: request.move_id,
        is_secret: request.is_secret,
    };

    info!(
        correlation_id = %command.correlation_id,
        roll_id = %command.roll_id,
        "handling roll_dice command"
    );

    let recorded = rolls::handle_roll_dice(
        &command,
        &caller,
        &*state.rng,
        state.clock.as_ref(),
        &*state.event_repository,
        state.broadcaster.as_ref(),
    )
    .await?;

    Ok(Json(RollDiceResponse {
        event_ids: recorded.outcome.event_ids(),
        roll: recorded.roll,
    }))
}

/// GET /rolls/{roll_id}
#[instrument(skip(state, caller))]
async fn get_roll(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(roll_id): Path<Uuid>,
) -> Result<Json<query_handlers::RollView>, ApiError> {
    let view = query_handlers::get_roll_by_id(roll_id, &caller, &*state.event_repository).await?;
    Ok(Json(view))
}

/// Returns the router for the rules context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/roll", post(roll_dice))
        .route("/rolls/{roll_id}", get(get_roll))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::StatusCode;
    use loremaster_core::broadcast::{Audience, BroadcastKind};
    use loremaster_core::identity::Caller;
    use loremaster_resolution::testing::ScriptedNarrator;
    use serde_json::json;

    use crate::routes::testing::{harness_with, seed_character, send};

    #[tokio::test]
    async fn test_roll_returns_dice_and_outcome() {
        // Arrange
        let h = harness_with(ScriptedNarrator::new(), vec![4, 5]);
        let owner = Uuid::new_v4();
        let character_id = seed_character(&h.repo, Uuid::new_v4(), owner, "Juno").await;

        // Act
        let (status, json) = send(
            router().with_state(h.state),
            "POST",
            "/roll",
            Some(Caller::player(owner)),
            Some(&json!({
                "character_id": character_id,
                "stat": "hard",
                "situational_modifiers": [1]
            })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["dice"], json!([4, 5]));
        assert_eq!(json["modifier"], 3);
        assert_eq!(json["total"], 12);
        assert_eq!(json["outcome"], "strongHit");
        assert_eq!(json["event_ids"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_secret_roll_is_hidden_from_other_players() {
        // Arrange
        let h = harness_with(ScriptedNarrator::new(), vec![1, 2]);
        let owner = Uuid::new_v4();
        let character_id = seed_character(&h.repo, Uuid::new_v4(), owner, "Juno").await;
        let (_, rolled) = send(
            router().with_state(h.state.clone()),
            "POST",
            "/roll",
            Some(Caller::player(owner)),
            Some(&json!({ "character_id": character_id, "is_secret": true })),
        )
        .await;
        let roll_id = rolled["roll_id"].as_str().unwrap().to_owned();

        // Act
        let (owner_status, _) = send(
            router().with_state(h.state.clone()),
            "GET",
            &format!("/rolls/{roll_id}"),
            Some(Caller::player(owner)),
            None,
        )
        .await;
        let (other_status, json) = send(
            router().with_state(h.state),
            "GET",
            &format!("/rolls/{roll_id}"),
            Some(Caller::player(Uuid::new_v4())),
            None,
        )
        .await;

        // Assert
        assert_eq!(owner_status, StatusCode::OK);
        assert_eq!(other_status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "permission_denied");
        let published = h.broadcaster.published_of(BroadcastKind::DiceRolled);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].audience, Audience::User(owner));
    }

    #[tokio::test]
    async fn test_rolling_for_someone_elses_character_is_403() {
        let h = harness_with(ScriptedNarrator::new(), vec![]);
        let character_id = seed_character(&h.repo, Uuid::new_v4(), Uuid::new_v4(), "Juno").await;

        let (status, _) = send(
            router().with_state(h.state),
            "POST",
            "/roll",
            Some(Caller::player(Uuid::new_v4())),
            Some(&json!({ "character_id": character_id })),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
