//! Loremaster: Resolution bounded context.
//!
//! Operations that span several aggregates: opening and ending scenes,
//! rolling dice inside a scene, and the two-boundary resolution
//! coordinator that drives the external narrator. Every write here is a
//! single multi-stream batch.

pub mod application;
pub mod domain;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
