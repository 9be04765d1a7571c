//! Event repository abstraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;
use crate::event::DomainEvent;

/// Stored representation of a domain event.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Aggregate this event belongs to.
    pub aggregate_id: Uuid,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Sequence number within the aggregate stream.
    pub sequence_number: i64,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID linking to the causing event/command.
    pub causation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

/// Converts a domain event into its stored representation.
pub fn to_stored_event<E: DomainEvent>(event: &E) -> StoredEvent {
    let meta = event.metadata();
    StoredEvent {
        event_id: meta.event_id,
        aggregate_id: meta.aggregate_id,
        event_type: event.event_type().to_owned(),
        payload: event.to_payload(),
        sequence_number: meta.sequence_number,
        correlation_id: meta.correlation_id,
        causation_id: meta.causation_id,
        occurred_at: meta.occurred_at,
    }
}

/// One stream's share of an atomic multi-stream append.
///
/// An entry with no events is a pure version assertion: the batch fails with
/// `ConcurrencyConflict` unless the stream is still at `expected_version`.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    /// The stream being appended to.
    pub aggregate_id: Uuid,
    /// The version the writer loaded; the stream must still be at it.
    pub expected_version: i64,
    /// Events to append, in sequence order.
    pub events: Vec<StoredEvent>,
}

impl StreamAppend {
    /// Captures an aggregate's pending events against its loaded version.
    pub fn from_aggregate<A: AggregateRoot>(aggregate: &A) -> Self {
        Self {
            aggregate_id: aggregate.aggregate_id(),
            expected_version: aggregate.version(),
            events: aggregate.pending_stored_events(),
        }
    }
}

/// Repository trait for loading and appending domain events.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Load all events for a given aggregate, ordered by sequence number.
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError>;

    /// Append to several streams atomically: either every stream's
    /// expected version holds and all events are written, or nothing is.
    async fn append_batch(&self, batch: &[StreamAppend]) -> Result<(), DomainError>;

    /// Append new events to an aggregate stream with optimistic concurrency.
    /// `expected_version` is the last known sequence number.
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        self.append_batch(&[StreamAppend {
            aggregate_id,
            expected_version,
            events: events.to_vec(),
        }])
        .await
    }

    /// Load the events of an aggregate that must already exist.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an empty stream.
    async fn load_existing(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        let events = self.load_events(aggregate_id).await?;
        if events.is_empty() {
            return Err(DomainError::AggregateNotFound(aggregate_id));
        }
        Ok(events)
    }
}

/// Collects every stored event of a batch, in batch order.
#[must_use]
pub fn flatten_batch(batch: &[StreamAppend]) -> Vec<StoredEvent> {
    batch
        .iter()
        .flat_map(|append| append.events.iter().cloned())
        .collect()
}
