//! Loremaster: Scene bounded context.
//!
//! A scene is one narrative unit of a campaign. It moves
//! `AwaitingActions → Resolving → Resolved` and never back, and it owns the
//! append-only ledger of player actions plus the summaries of rolls made in
//! it. Every transition is an expected-version append on the scene stream,
//! so status checks and writes cannot interleave.

pub mod application;
pub mod domain;
