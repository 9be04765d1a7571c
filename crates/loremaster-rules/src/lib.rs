//! Loremaster: Dice Resolution bounded context.
//!
//! Scores player moves PbtA-style: two six-sided dice plus a stat and
//! situational modifiers, classified into a fixed three-tier outcome.
//! Every roll is recorded once as an immutable `DiceRoll` stream.

pub mod application;
pub mod domain;
