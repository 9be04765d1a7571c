//! Loremaster Core: shared domain abstractions.
//!
//! This crate defines the fundamental traits and types that all bounded
//! contexts depend on: event-sourced aggregates, the error taxonomy, the
//! event repository port, caller identity, and the broadcast port. It
//! contains no infrastructure code.

pub mod aggregate;
pub mod broadcast;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod identity;
pub mod repository;
pub mod retry;
pub mod rng;
