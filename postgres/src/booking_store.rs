//! `PostgreSQL` implementation of [`BookingStore`].
//!
//! The partial unique index `uq_bookings_active_user_event` rejects a second
//! confirmed booking for the same user and event; that violation surfaces as
//! [`StoreError::Conflict`].

use crate::error::map_sqlx_error;
use crate::event_store::{record_duration, to_db_count};
use chrono::{DateTime, Utc};
use eventease_core::store::{BookingStore, StoreFuture};
use eventease_core::{Booking, BookingId, BookingStatus, EventId, StoreError, UserId};
use sqlx::PgPool;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

const SELECT_BOOKING: &str =
    "SELECT id, user_id, event_id, seats, status, created_at, cancelled_at FROM bookings";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: String,
    event_id: Uuid,
    seats: i32,
    status: String,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, StoreError> {
        let seats = u32::try_from(self.seats).map_err(|_| {
            StoreError::Serialization(format!("booking {}: negative seats {}", self.id, self.seats))
        })?;
        let status = BookingStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Serialization(format!("booking {}: unknown status {:?}", self.id, self.status))
        })?;
        Ok(Booking {
            id: BookingId::from_uuid(self.id),
            user_id: UserId::new(self.user_id),
            event_id: EventId::from_uuid(self.event_id),
            seats,
            status,
            created_at: self.created_at,
            cancelled_at: self.cancelled_at,
        })
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> Result<Vec<Booking>, StoreError> {
    rows.into_iter().map(BookingRow::into_booking).collect()
}

/// Booking records in the `bookings` table.
#[derive(Clone, Debug)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl BookingStore for PostgresBookingStore {
    fn get_booking(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(
            async move {
                let started = Instant::now();
                let row: Option<BookingRow> =
                    sqlx::query_as(&format!("{SELECT_BOOKING} WHERE id = $1"))
                        .bind(id.as_uuid())
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(|e| map_sqlx_error("get_booking", e))?;
                record_duration("get_booking", started);
                row.map(BookingRow::into_booking).transpose()
            }
            .instrument(tracing::debug_span!("pg.get_booking", booking_id = %id)),
        )
    }

    fn get_active_booking(
        &self,
        user_id: &UserId,
        event_id: EventId,
    ) -> StoreFuture<'_, Option<Booking>> {
        let user_id = user_id.clone();
        let span = tracing::debug_span!("pg.get_active_booking", user_id = %user_id, event_id = %event_id);
        Box::pin(
            async move {
                let started = Instant::now();
                let row: Option<BookingRow> = sqlx::query_as(&format!(
                    "{SELECT_BOOKING} WHERE user_id = $1 AND event_id = $2 AND status = 'confirmed'"
                ))
                .bind(user_id.as_str())
                .bind(event_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_active_booking", e))?;
                record_duration("get_active_booking", started);
                row.map(BookingRow::into_booking).transpose()
            }
            .instrument(span),
        )
    }

    fn put_booking(&self, booking: Booking) -> StoreFuture<'_, ()> {
        let span = tracing::debug_span!("pg.put_booking", booking_id = %booking.id);
        Box::pin(
            async move {
                let started = Instant::now();
                sqlx::query(
                    "INSERT INTO bookings (id, user_id, event_id, seats, status, created_at, cancelled_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     ON CONFLICT (id) DO UPDATE SET
                         status = EXCLUDED.status,
                         cancelled_at = EXCLUDED.cancelled_at",
                )
                .bind(booking.id.as_uuid())
                .bind(booking.user_id.as_str())
                .bind(booking.event_id.as_uuid())
                .bind(to_db_count("seats", booking.seats)?)
                .bind(booking.status.as_str())
                .bind(booking.created_at)
                .bind(booking.cancelled_at)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("put_booking", e))?;
                record_duration("put_booking", started);
                Ok(())
            }
            .instrument(span),
        )
    }

    fn list_user_bookings(
        &self,
        user_id: &UserId,
        status: Option<BookingStatus>,
    ) -> StoreFuture<'_, Vec<Booking>> {
        let user_id = user_id.clone();
        let span = tracing::debug_span!("pg.list_user_bookings", user_id = %user_id);
        Box::pin(
            async move {
                let started = Instant::now();
                let rows: Vec<BookingRow> = sqlx::query_as(&format!(
                    "{SELECT_BOOKING}
                     WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)
                     ORDER BY created_at DESC, id"
                ))
                .bind(user_id.as_str())
                .bind(status.map(|s| s.as_str()))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_user_bookings", e))?;
                record_duration("list_user_bookings", started);
                into_bookings(rows)
            }
            .instrument(span),
        )
    }

    fn list_event_bookings(
        &self,
        event_id: EventId,
        status: Option<BookingStatus>,
    ) -> StoreFuture<'_, Vec<Booking>> {
        Box::pin(
            async move {
                let started = Instant::now();
                let rows: Vec<BookingRow> = sqlx::query_as(&format!(
                    "{SELECT_BOOKING}
                     WHERE event_id = $1 AND ($2::TEXT IS NULL OR status = $2)
                     ORDER BY created_at, id"
                ))
                .bind(event_id.as_uuid())
                .bind(status.map(|s| s.as_str()))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_event_bookings", e))?;
                record_duration("list_event_bookings", started);
                into_bookings(rows)
            }
            .instrument(tracing::debug_span!("pg.list_event_bookings", event_id = %event_id)),
        )
    }
}
