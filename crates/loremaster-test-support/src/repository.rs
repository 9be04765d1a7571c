//! Test repositories: mock `EventRepository` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use loremaster_core::error::DomainError;
use loremaster_core::repository::{EventRepository, StoredEvent, StreamAppend};
use uuid::Uuid;

/// An event repository that serves pre-seeded streams and records every
/// append. Appends always succeed and are not written back to the seeded
/// streams, so each handler call sees the state the test arranged.
#[derive(Debug, Default)]
pub struct RecordingEventRepository {
    streams: Mutex<HashMap<Uuid, Vec<StoredEvent>>>,
    appended: Mutex<Vec<StreamAppend>>,
}

impl RecordingEventRepository {
    /// Create a recording repository with no seeded streams.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the stream of `aggregate_id` with `events`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_stream(self, aggregate_id: Uuid, events: Vec<StoredEvent>) -> Self {
        self.streams.lock().unwrap().insert(aggregate_id, events);
        self
    }

    /// Returns a snapshot of all appends, one entry per stream touched, as
    /// `(aggregate_id, expected_version, events)`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<(Uuid, i64, Vec<StoredEvent>)> {
        self.appended
            .lock()
            .unwrap()
            .iter()
            .map(|a| (a.aggregate_id, a.expected_version, a.events.clone()))
            .collect()
    }

    /// Returns every appended event type, in append order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_event_types(&self) -> Vec<String> {
        self.appended
            .lock()
            .unwrap()
            .iter()
            .flat_map(|a| a.events.iter().map(|e| e.event_type.clone()))
            .collect()
    }
}

#[async_trait]
impl EventRepository for RecordingEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .streams
            .lock()
            .unwrap()
            .get(&aggregate_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_batch(&self, batch: &[StreamAppend]) -> Result<(), DomainError> {
        self.appended.lock().unwrap().extend(batch.iter().cloned());
        Ok(())
    }
}

/// An event repository that always returns an empty event list and silently
/// accepts appends. Useful for testing "aggregate not found" scenarios and
/// creation commands.
#[derive(Debug)]
pub struct EmptyEventRepository;

#[async_trait]
impl EventRepository for EmptyEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn append_batch(&self, _batch: &[StreamAppend]) -> Result<(), DomainError> {
        Ok(())
    }
}

/// An event repository that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append_batch(&self, _batch: &[StreamAppend]) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// Wraps another repository and yields to the scheduler after every load,
/// so concurrent handlers interleave between their read and their write.
#[derive(Debug, Default)]
pub struct YieldingEventRepository<R> {
    inner: R,
}

impl<R> YieldingEventRepository<R> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Returns the wrapped repository.
    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: EventRepository> EventRepository for YieldingEventRepository<R> {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        let events = self.inner.load_events(aggregate_id).await?;
        tokio::task::yield_now().await;
        Ok(events)
    }

    async fn append_batch(&self, batch: &[StreamAppend]) -> Result<(), DomainError> {
        self.inner.append_batch(batch).await
    }
}
