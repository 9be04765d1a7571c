//! Shared test mocks and utilities for the Loremaster engine.

mod broadcast;
mod clock;
mod repository;
mod rng;

pub use broadcast::RecordingBroadcaster;
pub use clock::{AdjustableClock, FixedClock, fixed_now};
pub use repository::{
    EmptyEventRepository, FailingEventRepository, RecordingEventRepository, YieldingEventRepository,
};
pub use rng::{MockRng, SequenceRng};
