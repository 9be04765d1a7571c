//! Domain model for the Character context.

pub mod aggregates;
pub mod commands;
pub mod events;
