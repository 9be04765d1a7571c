//! Application services for the Campaign context.

pub mod command_handlers;
pub mod query_handlers;
