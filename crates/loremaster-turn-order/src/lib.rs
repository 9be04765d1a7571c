//! Loremaster: Turn Order bounded context.
//!
//! An optional initiative tracker layered on a scene for strict turn
//! alternation. The turn pointer lives inside the `TurnTracker` aggregate
//! and only its methods move it. A tracker never gates action submission.

pub mod application;
pub mod domain;
