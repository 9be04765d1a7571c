//! Shared application state.

use std::sync::{Arc, Mutex};

use loremaster_core::broadcast::Broadcaster;
use loremaster_core::clock::Clock;
use loremaster_core::repository::EventRepository;
use loremaster_core::rng::DeterministicRng;
use loremaster_resolution::application::ResolutionSettings;
use loremaster_resolution::domain::narrator::Narrator;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock for deterministic time.
    pub clock: Arc<dyn Clock + Send + Sync>,
    /// RNG for dice rolls.
    pub rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    /// Event repository for persistence.
    pub event_repository: Arc<dyn EventRepository>,
    /// Real-time outbound channel.
    pub broadcaster: Arc<dyn Broadcaster>,
    /// External narrator.
    pub narrator: Arc<dyn Narrator>,
    /// Resolution timing knobs.
    pub settings: ResolutionSettings,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock + Send + Sync>,
        rng: Arc<Mutex<dyn DeterministicRng + Send>>,
        event_repository: Arc<dyn EventRepository>,
        broadcaster: Arc<dyn Broadcaster>,
        narrator: Arc<dyn Narrator>,
        settings: ResolutionSettings,
    ) -> Self {
        Self {
            clock,
            rng,
            event_repository,
            broadcaster,
            narrator,
            settings,
        }
    }
}
