//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use loremaster_core::broadcast::Broadcaster;
use loremaster_core::clock::Clock;
use loremaster_core::identity::Caller;
use loremaster_core::repository::EventRepository;
use loremaster_core::rng::DeterministicRng;
use loremaster_event_store::memory_event_repository::InMemoryEventRepository;
use loremaster_event_store::pg_event_repository::PgEventRepository;
use loremaster_resolution::application::ResolutionSettings;
use loremaster_resolution::domain::narrator::Narrator;
use loremaster_resolution::testing::ScriptedNarrator;
use loremaster_test_support::{FixedClock, RecordingBroadcaster, SequenceRng};
use sqlx::PgPool;
use tower::ServiceExt;

use loremaster_api::app;
use loremaster_api::identity::{CAMPAIGN_ROLE_HEADER, USER_ID_HEADER};
use loremaster_api::state::AppState;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock + Send + Sync> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// A running app plus handles onto its doubles.
pub struct TestApp {
    pub router: Router,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub narrator: Arc<ScriptedNarrator>,
}

fn build(
    event_repository: Arc<dyn EventRepository>,
    narrator: ScriptedNarrator,
    dice: Vec<u32>,
) -> TestApp {
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> =
        Arc::new(Mutex::new(SequenceRng::new(dice)));
    let broadcaster = Arc::new(RecordingBroadcaster::new());
    let narrator = Arc::new(narrator);
    let dyn_broadcaster: Arc<dyn Broadcaster> = broadcaster.clone();
    let dyn_narrator: Arc<dyn Narrator> = narrator.clone();
    let app_state = AppState::new(
        fixed_clock(),
        rng,
        event_repository,
        dyn_broadcaster,
        dyn_narrator,
        ResolutionSettings::default(),
    );

    TestApp {
        router: app(app_state),
        broadcaster,
        narrator,
    }
}

/// Build the full app over the in-process event store.
pub fn build_test_app(narrator: ScriptedNarrator, dice: Vec<u32>) -> TestApp {
    build(Arc::new(InMemoryEventRepository::new()), narrator, dice)
}

/// Build the full app over a real `PgEventRepository`.
pub fn build_pg_test_app(pool: PgPool, narrator: ScriptedNarrator, dice: Vec<u32>) -> TestApp {
    build(Arc::new(PgEventRepository::new(pool)), narrator, dice)
}

fn with_caller(
    builder: axum::http::request::Builder,
    caller: Caller,
) -> axum::http::request::Builder {
    let role = if caller.is_admin() { "admin" } else { "player" };
    builder
        .header(USER_ID_HEADER, caller.user_id.to_string())
        .header(CAMPAIGN_ROLE_HEADER, role)
}

/// Send a POST request with a JSON body as `caller` and return the response.
pub async fn post_json(
    app: &Router,
    uri: &str,
    caller: Caller,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = with_caller(Request::builder().method("POST").uri(uri), caller)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request as `caller` and return the response.
pub async fn get_json(app: &Router, uri: &str, caller: Caller) -> (StatusCode, serde_json::Value) {
    let request = with_caller(Request::builder().method("GET").uri(uri), caller)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
