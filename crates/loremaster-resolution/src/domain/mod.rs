//! Domain model for the Resolution context.

pub mod commands;
pub mod narrator;
