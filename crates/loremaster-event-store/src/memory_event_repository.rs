//! In-process implementation of the `EventRepository` trait.
//!
//! Used when no database is configured and by end-to-end tests that need
//! real optimistic-concurrency behavior.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use loremaster_core::error::DomainError;
use loremaster_core::repository::{EventRepository, StoredEvent, StreamAppend};

/// Event repository holding every stream in memory behind one mutex.
///
/// The mutex is held only for the synchronous check-and-write of a batch,
/// never across an await point.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    streams: Mutex<HashMap<Uuid, Vec<StoredEvent>>>,
}

impl InMemoryEventRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of events stored across all streams.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the internal mutex is poisoned.
    pub fn event_count(&self) -> Result<usize, DomainError> {
        let streams = self.lock()?;
        Ok(streams.values().map(Vec::len).sum())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Vec<StoredEvent>>>, DomainError> {
        self.streams
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("event store mutex poisoned: {e}")))
    }
}

#[allow(clippy::cast_possible_wrap)]
fn stream_version(streams: &HashMap<Uuid, Vec<StoredEvent>>, aggregate_id: Uuid) -> i64 {
    streams
        .get(&aggregate_id)
        .map_or(0, |events| events.len() as i64)
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        let streams = self.lock()?;
        Ok(streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    async fn append_batch(&self, batch: &[StreamAppend]) -> Result<(), DomainError> {
        let mut streams = self.lock()?;

        // A stream may appear twice in one batch; later entries see the
        // version the earlier ones will produce.
        let mut projected: HashMap<Uuid, i64> = HashMap::new();
        for append in batch {
            let actual = *projected
                .entry(append.aggregate_id)
                .or_insert_with(|| stream_version(&streams, append.aggregate_id));
            if actual != append.expected_version {
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id: append.aggregate_id,
                    expected: append.expected_version,
                    actual,
                });
            }
            for (offset, event) in append.events.iter().enumerate() {
                #[allow(clippy::cast_possible_wrap)]
                let expected_sequence = actual + offset as i64 + 1;
                if event.sequence_number != expected_sequence {
                    return Err(DomainError::Infrastructure(format!(
                        "event {} has sequence number {}, expected {expected_sequence}",
                        event.event_id, event.sequence_number
                    )));
                }
            }
            #[allow(clippy::cast_possible_wrap)]
            projected.insert(
                append.aggregate_id,
                actual + append.events.len() as i64,
            );
        }

        for append in batch {
            streams
                .entry(append.aggregate_id)
                .or_default()
                .extend(append.events.iter().cloned());
        }
        Ok(())
    }
}
