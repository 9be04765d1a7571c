//! Domain model for the Campaign context.

pub mod aggregates;
pub mod clocks;
pub mod events;
