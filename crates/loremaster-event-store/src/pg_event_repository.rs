//! `PostgreSQL` implementation of the `EventRepository` trait.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use loremaster_core::error::DomainError;
use loremaster_core::repository::{EventRepository, StoredEvent, StreamAppend};

use crate::schema;

/// PostgreSQL-backed event repository.
///
/// Each batch runs in one transaction. Writers take a transaction-scoped
/// advisory lock per stream (in a fixed order, so batches never deadlock)
/// before comparing versions, which makes the version check and the
/// insert a single atomic step. The `(aggregate_id, sequence_number)`
/// unique constraint backs this up.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Creates a new `PgEventRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn infrastructure(err: &sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("event store: {err}"))
}

#[allow(clippy::cast_possible_wrap)]
fn advisory_key(aggregate_id: Uuid) -> i64 {
    let (hi, lo) = aggregate_id.as_u64_pair();
    (hi ^ lo) as i64
}

fn row_to_stored_event(row: &PgRow) -> Result<StoredEvent, DomainError> {
    Ok(StoredEvent {
        event_id: row.try_get("event_id").map_err(|e| infrastructure(&e))?,
        aggregate_id: row.try_get("aggregate_id").map_err(|e| infrastructure(&e))?,
        event_type: row.try_get("event_type").map_err(|e| infrastructure(&e))?,
        payload: row.try_get("payload").map_err(|e| infrastructure(&e))?,
        sequence_number: row
            .try_get("sequence_number")
            .map_err(|e| infrastructure(&e))?,
        correlation_id: row.try_get("correlation_id").map_err(|e| infrastructure(&e))?,
        causation_id: row.try_get("causation_id").map_err(|e| infrastructure(&e))?,
        occurred_at: row.try_get("occurred_at").map_err(|e| infrastructure(&e))?,
    })
}

#[async_trait]
impl EventRepository for PgEventRepository {
    #[instrument(skip(self))]
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        let rows = sqlx::query(schema::SELECT_STREAM)
            .bind(aggregate_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| infrastructure(&e))?;

        rows.iter().map(row_to_stored_event).collect()
    }

    #[instrument(skip(self, batch), fields(streams = batch.len()))]
    async fn append_batch(&self, batch: &[StreamAppend]) -> Result<(), DomainError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(|e| infrastructure(&e))?;

        let mut lock_order: Vec<Uuid> = batch.iter().map(|a| a.aggregate_id).collect();
        lock_order.sort_unstable();
        lock_order.dedup();
        for aggregate_id in &lock_order {
            sqlx::query(schema::LOCK_STREAM)
                .bind(advisory_key(*aggregate_id))
                .execute(&mut *tx)
                .await
                .map_err(|e| infrastructure(&e))?;
        }

        for append in batch {
            let actual: i64 = sqlx::query_scalar(schema::SELECT_STREAM_VERSION)
                .bind(append.aggregate_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| infrastructure(&e))?;

            if actual != append.expected_version {
                // Dropping `tx` rolls back anything written for earlier streams.
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id: append.aggregate_id,
                    expected: append.expected_version,
                    actual,
                });
            }

            for event in &append.events {
                sqlx::query(schema::INSERT_EVENT)
                    .bind(event.event_id)
                    .bind(event.aggregate_id)
                    .bind(&event.event_type)
                    .bind(&event.payload)
                    .bind(event.sequence_number)
                    .bind(event.correlation_id)
                    .bind(event.causation_id)
                    .bind(event.occurred_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| match &e {
                        sqlx::Error::Database(db) if db.is_unique_violation() => {
                            DomainError::ConcurrencyConflict {
                                aggregate_id: append.aggregate_id,
                                expected: append.expected_version,
                                actual: event.sequence_number,
                            }
                        }
                        _ => infrastructure(&e),
                    })?;
            }
        }

        tx.commit().await.map_err(|e| infrastructure(&e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisory_key_is_stable_per_aggregate() {
        let id = Uuid::new_v4();
        assert_eq!(advisory_key(id), advisory_key(id));
    }

    #[test]
    fn test_advisory_key_of_nil_is_zero() {
        assert_eq!(advisory_key(Uuid::nil()), 0);
    }
}
