//! Loremaster: Campaign bounded context.
//!
//! The campaign stream is the registry for its scenes: it holds the single
//! live-scene slot, hands out scene numbers and keeps the campaign's
//! progress clocks. Campaign CRUD happens elsewhere, so an empty stream is
//! simply a campaign that has not played yet.

pub mod application;
pub mod domain;
