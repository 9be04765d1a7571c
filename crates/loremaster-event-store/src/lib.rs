//! Loremaster event stores.
//!
//! Both stores honor the same contract: per-stream expected versions and
//! all-or-nothing multi-stream batches.

pub mod memory_event_repository;
pub mod pg_event_repository;
pub mod schema;
