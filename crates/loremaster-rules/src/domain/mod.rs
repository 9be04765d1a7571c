//! Domain model for the Dice Resolution context.

pub mod aggregates;
pub mod dice;
pub mod events;
