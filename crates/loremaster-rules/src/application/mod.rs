//! Application services for the Dice Resolution context.

pub mod command_handlers;
pub mod query_handlers;
