//! `PostgreSQL` implementation of [`EventStore`].

use crate::error::map_sqlx_error;
use chrono::{DateTime, Utc};
use eventease_core::store::{EventStore, StoreFuture};
use eventease_core::{BusinessId, Event, EventId, StoreError};
use sqlx::PgPool;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

const SELECT_EVENT: &str = "SELECT id, business_id, name, description, category, location,
            starts_at, capacity, occupancy, created_at, updated_at
     FROM events";

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    business_id: String,
    name: String,
    description: String,
    category: String,
    location: String,
    starts_at: DateTime<Utc>,
    capacity: i32,
    occupancy: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EventRow {
    fn into_event(self) -> Result<Event, StoreError> {
        let count = |column: &str, value: i32| {
            u32::try_from(value).map_err(|_| {
                StoreError::Serialization(format!("event {}: negative {column} {value}", self.id))
            })
        };
        Ok(Event {
            capacity: count("capacity", self.capacity)?,
            occupancy: count("occupancy", self.occupancy)?,
            id: EventId::from_uuid(self.id),
            business_id: BusinessId::from_string(self.business_id),
            name: self.name,
            description: self.description,
            category: self.category,
            location: self.location,
            starts_at: self.starts_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(crate) fn to_db_count(column: &str, value: u32) -> Result<i32, StoreError> {
    i32::try_from(value)
        .map_err(|_| StoreError::Serialization(format!("{column} {value} exceeds INTEGER range")))
}

pub(crate) fn record_duration(op: &'static str, started: Instant) {
    metrics::histogram!("store_operation_duration_seconds", "op" => op)
        .record(started.elapsed().as_secs_f64());
}

/// Event records in the `events` table.
#[derive(Clone, Debug)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl EventStore for PostgresEventStore {
    fn get_event(&self, id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(
            async move {
                let started = Instant::now();
                let row: Option<EventRow> = sqlx::query_as(&format!("{SELECT_EVENT} WHERE id = $1"))
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| map_sqlx_error("get_event", e))?;
                record_duration("get_event", started);
                row.map(EventRow::into_event).transpose()
            }
            .instrument(tracing::debug_span!("pg.get_event", event_id = %id)),
        )
    }

    fn put_event(&self, event: Event) -> StoreFuture<'_, ()> {
        let span = tracing::debug_span!("pg.put_event", event_id = %event.id);
        Box::pin(
            async move {
                let started = Instant::now();
                sqlx::query(
                    "INSERT INTO events (id, business_id, name, description, category, location,
                                         starts_at, capacity, occupancy, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                     ON CONFLICT (id) DO UPDATE SET
                         business_id = EXCLUDED.business_id,
                         name = EXCLUDED.name,
                         description = EXCLUDED.description,
                         category = EXCLUDED.category,
                         location = EXCLUDED.location,
                         starts_at = EXCLUDED.starts_at,
                         capacity = EXCLUDED.capacity,
                         updated_at = EXCLUDED.updated_at",
                )
                .bind(event.id.as_uuid())
                .bind(event.business_id.as_str())
                .bind(&event.name)
                .bind(&event.description)
                .bind(&event.category)
                .bind(&event.location)
                .bind(event.starts_at)
                .bind(to_db_count("capacity", event.capacity)?)
                .bind(to_db_count("occupancy", event.occupancy)?)
                .bind(event.created_at)
                .bind(event.updated_at)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("put_event", e))?;
                record_duration("put_event", started);
                Ok(())
            }
            .instrument(span),
        )
    }

    fn update_occupancy(
        &self,
        id: EventId,
        expected: u32,
        occupancy: u32,
        updated_at: DateTime<Utc>,
    ) -> StoreFuture<'_, ()> {
        let span = tracing::debug_span!("pg.update_occupancy", event_id = %id, expected, occupancy);
        Box::pin(
            async move {
                let started = Instant::now();
                let result = sqlx::query(
                    "UPDATE events SET occupancy = $3, updated_at = $4
                     WHERE id = $1 AND occupancy = $2",
                )
                .bind(id.as_uuid())
                .bind(to_db_count("occupancy", expected)?)
                .bind(to_db_count("occupancy", occupancy)?)
                .bind(updated_at)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("update_occupancy", e))?;
                record_duration("update_occupancy", started);

                if result.rows_affected() > 0 {
                    return Ok(());
                }

                let stored: Option<i32> =
                    sqlx::query_scalar("SELECT occupancy FROM events WHERE id = $1")
                        .bind(id.as_uuid())
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(|e| map_sqlx_error("update_occupancy", e))?;
                match stored {
                    None => Err(StoreError::NotFound(format!("event {id}"))),
                    Some(stored) => Err(StoreError::Conflict(format!(
                        "event {id}: occupancy is {stored}, expected {expected}"
                    ))),
                }
            }
            .instrument(span),
        )
    }

    fn list_events(&self) -> StoreFuture<'_, Vec<Event>> {
        Box::pin(
            async move {
                let started = Instant::now();
                let rows: Vec<EventRow> =
                    sqlx::query_as(&format!("{SELECT_EVENT} ORDER BY starts_at, id"))
                        .fetch_all(&self.pool)
                        .await
                        .map_err(|e| map_sqlx_error("list_events", e))?;
                record_duration("list_events", started);
                rows.into_iter().map(EventRow::into_event).collect()
            }
            .instrument(tracing::debug_span!("pg.list_events")),
        )
    }

    fn delete_event(&self, id: EventId) -> StoreFuture<'_, bool> {
        Box::pin(
            async move {
                let started = Instant::now();
                let result = sqlx::query("DELETE FROM events WHERE id = $1")
                    .bind(id.as_uuid())
                    .execute(&self.pool)
                    .await
                    .map_err(|e| map_sqlx_error("delete_event", e))?;
                record_duration("delete_event", started);
                Ok(result.rows_affected() > 0)
            }
            .instrument(tracing::debug_span!("pg.delete_event", event_id = %id)),
        )
    }
}
