//! Loremaster: HTTP API.
//!
//! Routes per bounded context, error mapping, configuration, telemetry and
//! the production adapters for the narrator and broadcast ports.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod identity;
pub mod narrator;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/characters", routes::characters::router())
        .nest("/api/v1/campaigns", routes::campaigns::router())
        .nest("/api/v1/scenes", routes::scenes::router())
        .nest("/api/v1/turn-order", routes::turn_order::router())
        .nest("/api/v1/rules", routes::rules::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
