//! Application services for the Character context.

pub mod command_handlers;
pub mod query_handlers;
