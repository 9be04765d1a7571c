//! Application services for the Turn Order context.

pub mod command_handlers;
pub mod query_handlers;
