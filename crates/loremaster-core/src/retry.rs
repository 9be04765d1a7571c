//! Optimistic-concurrency retry.
//!
//! Handlers that lose an expected-version race reload and re-run their
//! guard checks. Re-running is what makes the retry safe: a command whose
//! precondition no longer holds fails with its guard error instead of
//! being applied on top of state it never saw.

use std::future::Future;

use crate::error::DomainError;

/// Attempts made by handlers that retry on version conflicts.
pub const DEFAULT_CONFLICT_ATTEMPTS: usize = 5;

/// Runs `operation` until it stops failing with `ConcurrencyConflict`, at
/// most `attempts` times. The last conflict is returned if every attempt
/// loses.
///
/// # Errors
///
/// Returns whatever the final attempt returned.
pub async fn retry_on_conflict<T, F, Fut>(
    attempts: usize,
    mut operation: F,
) -> Result<T, DomainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    let mut remaining = attempts.max(1);
    loop {
        remaining -= 1;
        match operation().await {
            Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            }) if remaining > 0 => {
                tracing::debug!(
                    %aggregate_id,
                    expected,
                    actual,
                    remaining,
                    "version conflict, reloading and retrying"
                );
            }
            other => return other,
        }
    }
}
