//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
///
/// Guard violations (`Conflict`, `InvalidState`, `AlreadyResolving`, ...) are
/// caller errors and are surfaced as-is. `NarratorFailure` is the only
/// retryable domain outcome.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// A uniqueness rule was violated (second live scene, second active tracker).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation is not valid for the aggregate's current status.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The caller lacks the role or ownership the operation requires.
    #[error("permission denied: {0}")]
    Permission(String),

    /// A player tried to end a turn that is not theirs.
    #[error("not your turn: it is {current}'s turn")]
    NotYourTurn {
        /// The character whose turn it actually is.
        current: Uuid,
    },

    /// Resolution was requested on a scene with no submitted actions.
    #[error("scene {0} has no actions to resolve")]
    EmptyLedger(Uuid),

    /// Another caller already owns the in-flight resolution of this scene.
    #[error("scene {0} is already being resolved")]
    AlreadyResolving(Uuid),

    /// No turn tracker is active for the scene (freeform mode).
    #[error("no active turn tracker for scene {0}")]
    NoActiveTracker(Uuid),

    /// The external narrator failed, timed out, or returned unusable output.
    /// The scene stays in `Resolving` and the call may be retried.
    #[error("narrator failure: {0}")]
    NarratorFailure(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for errors the caller may resolve by simply retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NarratorFailure(_) | Self::ConcurrencyConflict { .. }
        )
    }
}
