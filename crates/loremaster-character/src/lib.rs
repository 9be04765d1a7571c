//! Loremaster: Character bounded context.
//!
//! Character sheets as far as play needs them: the fixed stat block, harm,
//! conditions, forward/ongoing holds and relationship scores.

pub mod application;
pub mod domain;
