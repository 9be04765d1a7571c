//! Loremaster API server entry point.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use loremaster_api::broadcast::BroadcastHub;
use loremaster_api::config::AppConfig;
use loremaster_api::error::AppError;
use loremaster_api::narrator::{HttpNarrator, UnconfiguredNarrator};
use loremaster_api::state::AppState;
use loremaster_api::{app, telemetry};
use loremaster_core::clock::{Clock, SystemClock};
use loremaster_core::repository::EventRepository;
use loremaster_core::rng::{DeterministicRng, StdDeterministicRng};
use loremaster_event_store::memory_event_repository::InMemoryEventRepository;
use loremaster_event_store::pg_event_repository::PgEventRepository;
use loremaster_resolution::domain::narrator::Narrator;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let _telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Loremaster API server");

    let event_repository = event_repository(&config).await?;

    let narrator: Arc<dyn Narrator> = match &config.narrator_url {
        Some(url) => Arc::new(HttpNarrator::new(url.clone(), config.narrator_timeout)?),
        None => {
            tracing::warn!("NARRATOR_URL is not set; scene resolution will fail until it is");
            Arc::new(UnconfiguredNarrator)
        }
    };

    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(SystemClock);
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> =
        Arc::new(Mutex::new(StdDeterministicRng::from_os_rng()));
    let hub = BroadcastHub::new(config.broadcast_capacity);

    let app_state = AppState::new(
        clock,
        rng,
        event_repository,
        Arc::new(hub),
        narrator,
        config.resolution_settings()?,
    );

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app(app_state)).await?;

    Ok(())
}

async fn event_repository(config: &AppConfig) -> Result<Arc<dyn EventRepository>, AppError> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL is not set; events are kept in memory only");
        return Ok(Arc::new(InMemoryEventRepository::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(Arc::new(PgEventRepository::new(pool)))
}
