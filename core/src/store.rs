//! Storage abstractions for events and bookings.
//!
//! Both stores are plain keyed persistence: each write is an atomic upsert of one
//! record. No cross-entity invariant lives here; capacity is enforced by the
//! admission controller, which is the only writer of an event's occupancy.
//!
//! Occupancy is never written by [`EventStore::put_event`] on an existing
//! record. It changes only through [`EventStore::update_occupancy`], a
//! compare-and-set against the value the caller read, so two processes sharing
//! one database cannot silently overwrite each other's reservations.
//!
//! # Implementations
//!
//! - `InMemoryEventStore` / `InMemoryBookingStore` (in `eventease-testing`): fast, deterministic tests
//! - `PostgresEventStore` / `PostgresBookingStore` (in `eventease-postgres`): production
//!
//! # Dyn Compatibility
//!
//! The traits return `Pin<Box<dyn Future>>` instead of using `async fn` so they can
//! be shared as `Arc<dyn EventStore>` across request handlers.

use crate::error::StoreError;
use crate::types::{Booking, BookingId, BookingStatus, Event, EventId, UserId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Persistence of [`Event`] records.
pub trait EventStore: Send + Sync {
    /// Load an event by id. A missing event is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// - `Database`: connection or query failed
    /// - `Serialization`: a stored row could not be decoded
    fn get_event(&self, id: EventId) -> StoreFuture<'_, Option<Event>>;

    /// Insert an event, or replace the descriptive fields of an existing one.
    ///
    /// On insert the record takes `event.occupancy`; on update the stored
    /// occupancy is kept.
    ///
    /// # Errors
    ///
    /// - `Conflict`: another event already uses this business id
    /// - `Database`: connection or query failed, or occupancy would exceed capacity
    fn put_event(&self, event: Event) -> StoreFuture<'_, ()>;

    /// Set an event's occupancy to `occupancy` if it is still `expected`.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such event
    /// - `Conflict`: the stored occupancy is no longer `expected`
    /// - `Database`: connection or query failed, or `occupancy` exceeds capacity
    fn update_occupancy(
        &self,
        id: EventId,
        expected: u32,
        occupancy: u32,
        updated_at: DateTime<Utc>,
    ) -> StoreFuture<'_, ()>;

    /// All events, ordered by start time.
    ///
    /// # Errors
    ///
    /// - `Database`: connection or query failed
    fn list_events(&self) -> StoreFuture<'_, Vec<Event>>;

    /// Remove an event. Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// - `Database`: connection or query failed
    fn delete_event(&self, id: EventId) -> StoreFuture<'_, bool>;
}

/// Persistence of [`Booking`] records.
pub trait BookingStore: Send + Sync {
    /// Load a booking by id.
    ///
    /// # Errors
    ///
    /// - `Database`: connection or query failed
    fn get_booking(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>>;

    /// The confirmed booking a user holds for an event, if any.
    ///
    /// # Errors
    ///
    /// - `Database`: connection or query failed
    fn get_active_booking(
        &self,
        user_id: &UserId,
        event_id: EventId,
    ) -> StoreFuture<'_, Option<Booking>>;

    /// Insert or replace a booking.
    ///
    /// # Errors
    ///
    /// - `Conflict`: the write would give the user a second confirmed booking
    ///   for the same event
    /// - `Database`: connection or query failed
    fn put_booking(&self, booking: Booking) -> StoreFuture<'_, ()>;

    /// Bookings held by a user, newest first. `None` returns every status.
    ///
    /// # Errors
    ///
    /// - `Database`: connection or query failed
    fn list_user_bookings(
        &self,
        user_id: &UserId,
        status: Option<BookingStatus>,
    ) -> StoreFuture<'_, Vec<Booking>>;

    /// Bookings referencing an event, oldest first. `None` returns every status.
    ///
    /// # Errors
    ///
    /// - `Database`: connection or query failed
    fn list_event_bookings(
        &self,
        event_id: EventId,
        status: Option<BookingStatus>,
    ) -> StoreFuture<'_, Vec<Booking>>;
}
