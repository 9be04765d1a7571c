//! Domain model for the Turn Order context.

pub mod aggregates;
pub mod commands;
pub mod events;
