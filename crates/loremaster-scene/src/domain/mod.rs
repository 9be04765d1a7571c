//! Domain model for the Scene context.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod ledger;
