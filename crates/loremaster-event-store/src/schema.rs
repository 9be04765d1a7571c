//! Event store database schema.
//!
//! The canonical DDL lives in `migrations/`; this module exposes the
//! statements the repository issues so they are reviewed in one place.

/// Loads one stream in sequence order.
pub const SELECT_STREAM: &str = r"
SELECT event_id, aggregate_id, event_type, payload, sequence_number,
       correlation_id, causation_id, occurred_at
FROM domain_events
WHERE aggregate_id = $1
ORDER BY sequence_number ASC
";

/// Returns the current version (highest sequence number, 0 when empty).
pub const SELECT_STREAM_VERSION: &str = r"
SELECT COALESCE(MAX(sequence_number), 0)
FROM domain_events
WHERE aggregate_id = $1
";

/// Serializes writers of one stream until the enclosing transaction ends.
pub const LOCK_STREAM: &str = "SELECT pg_advisory_xact_lock($1)";

/// Inserts one event.
pub const INSERT_EVENT: &str = r"
INSERT INTO domain_events (
    event_id, aggregate_id, event_type, payload, sequence_number,
    correlation_id, causation_id, occurred_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
";
