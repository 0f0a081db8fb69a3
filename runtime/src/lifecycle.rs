//! Booking lifecycle manager.
//!
//! Orchestrates booking creation and cancellation as units spanning two
//! records: the booking itself and the event's occupancy.
//!
//! ```text
//! Requested ──reserve ok + write ok──► Confirmed ──cancel──► Cancelled
//!     │
//!     └──any rejection──► (no booking exists)
//! ```
//!
//! Each unit runs inside the event's admission section. When the booking write
//! fails after a successful reservation, the reservation is released before the
//! error is returned, so callers never observe seats held without a booking.
//!
//! Units run on a task of their own. A caller that goes away mid-request (a
//! dropped HTTP connection) stops waiting for the outcome but never stops the
//! unit between its two writes.

use crate::admission::{AdmissionController, EventSection};
use crate::audit::{BookingObserver, TracingObserver};
use crate::metrics::BookingMetrics;
use eventease_core::store::BookingStore;
use eventease_core::{
    Booking, BookingError, BookingId, BookingStatus, Event, EventId, StoreError, UserId,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

/// A booking together with the event it references.
///
/// `event` is `None` when the event record no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingView {
    /// The booking
    pub booking: Booking,
    /// The referenced event, if it still exists
    pub event: Option<Event>,
}

/// Creates and cancels bookings.
#[derive(Clone)]
pub struct BookingLifecycle {
    admission: AdmissionController,
    bookings: Arc<dyn BookingStore>,
    observer: Arc<dyn BookingObserver>,
}

impl std::fmt::Debug for BookingLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingLifecycle")
            .field("admission", &self.admission)
            .finish_non_exhaustive()
    }
}

fn reject(error: BookingError) -> BookingError {
    BookingMetrics::record_rejection(error.reason());
    error
}

/// Run `unit` to completion on its own task, even if the caller stops polling.
async fn detached<F>(unit: F) -> Result<Booking, BookingError>
where
    F: Future<Output = Result<Booking, BookingError>> + Send + 'static,
{
    tokio::spawn(unit.in_current_span())
        .await
        .unwrap_or_else(|join_error| {
            tracing::error!(error = %join_error, "Booking task ended abnormally");
            Err(BookingError::Interrupted(join_error.to_string()))
        })
}

impl BookingLifecycle {
    /// Create a lifecycle manager that reports to a [`TracingObserver`].
    #[must_use]
    pub fn new(admission: AdmissionController, bookings: Arc<dyn BookingStore>) -> Self {
        Self {
            admission,
            bookings,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BookingObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The admission controller guarding occupancy.
    #[must_use]
    pub const fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Book `seats` on `event_id` for `user_id`.
    ///
    /// # Errors
    ///
    /// - `Busy`: the event's section could not be entered in time
    /// - `AlreadyBooked`: the user already holds a confirmed booking for the event
    /// - `EventNotFound`, `EventPassed`, `InvalidSeatCount`, `CapacityExceeded`:
    ///   from the admission controller, unchanged
    /// - `Storage`: a read or write failed; any reservation has been released
    /// - `Interrupted`: the booking task panicked or was aborted
    #[tracing::instrument(skip(self), fields(user_id = %user_id, event_id = %event_id))]
    pub async fn create_booking(
        &self,
        user_id: &UserId,
        event_id: EventId,
        seats: u32,
    ) -> Result<Booking, BookingError> {
        let this = self.clone();
        let user_id = user_id.clone();
        detached(async move { this.create(&user_id, event_id, seats).await }).await
    }

    async fn create(
        &self,
        user_id: &UserId,
        event_id: EventId,
        seats: u32,
    ) -> Result<Booking, BookingError> {
        self.observer.requested(user_id, event_id, seats);

        let result = self.admit(user_id, event_id, seats).await;
        match &result {
            Ok(booking) => {
                BookingMetrics::record_created();
                self.observer.confirmed(booking);
            }
            Err(error) => self.observer.rejected(user_id, Some(event_id), error),
        }
        result
    }

    async fn admit(
        &self,
        user_id: &UserId,
        event_id: EventId,
        seats: u32,
    ) -> Result<Booking, BookingError> {
        let section = self.admission.enter(event_id).await?;

        if self
            .bookings
            .get_active_booking(user_id, event_id)
            .await?
            .is_some()
        {
            return Err(reject(BookingError::AlreadyBooked));
        }

        section.reserve(seats).await?;

        let booking = Booking::confirmed(user_id.clone(), event_id, seats, section.now());
        if let Err(write_error) = self.bookings.put_booking(booking.clone()).await {
            self.compensate(&section, seats, &write_error).await;
            return Err(match write_error {
                // Another writer slipped a confirmed booking past the section
                StoreError::Conflict(_) => reject(BookingError::AlreadyBooked),
                other => BookingError::Storage(other),
            });
        }

        tracing::info!(booking_id = %booking.id, seats, "Booking confirmed");
        Ok(booking)
    }

    /// Undo a reservation whose booking record could not be written.
    async fn compensate(&self, section: &EventSection, seats: u32, cause: &StoreError) {
        match section.release(seats).await {
            Ok(event) => {
                BookingMetrics::record_compensation(true);
                tracing::warn!(
                    error = %cause,
                    occupancy = event.occupancy,
                    "Booking write failed, reservation released"
                );
            }
            Err(release_error) => {
                BookingMetrics::record_compensation(false);
                tracing::error!(
                    error = %cause,
                    release_error = %release_error,
                    seats,
                    "Booking write failed and the compensating release failed too"
                );
            }
        }
    }

    /// Cancel `booking_id` on behalf of `user_id` and hand its seats back.
    ///
    /// # Errors
    ///
    /// - `BookingNotFound`: no such booking
    /// - `NotAuthorized`: the booking belongs to someone else
    /// - `Busy`: the event's section could not be entered in time
    /// - `AlreadyCancelled`: the booking was cancelled before
    /// - `EventAlreadyStarted`: the event's start time has passed
    /// - `Storage`: a read or write failed; the booking is left confirmed
    /// - `Interrupted`: the cancellation task panicked or was aborted
    #[tracing::instrument(skip(self), fields(user_id = %user_id, booking_id = %booking_id))]
    pub async fn cancel_booking(
        &self,
        user_id: &UserId,
        booking_id: BookingId,
    ) -> Result<Booking, BookingError> {
        let this = self.clone();
        let user_id = user_id.clone();
        detached(async move { this.cancel_and_notify(&user_id, booking_id).await }).await
    }

    async fn cancel_and_notify(
        &self,
        user_id: &UserId,
        booking_id: BookingId,
    ) -> Result<Booking, BookingError> {
        let result = self.cancel(user_id, booking_id).await;
        match &result {
            Ok(booking) => {
                BookingMetrics::record_cancelled();
                self.observer.cancelled(booking);
            }
            Err(error) => self.observer.rejected(user_id, None, error),
        }
        result
    }

    async fn cancel(&self, user_id: &UserId, booking_id: BookingId) -> Result<Booking, BookingError> {
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| reject(BookingError::BookingNotFound(booking_id)))?;

        if &booking.user_id != user_id {
            return Err(reject(BookingError::NotAuthorized));
        }

        let section = self.admission.enter(booking.event_id).await?;

        // Re-read under the section: a concurrent cancel may have won
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| reject(BookingError::BookingNotFound(booking_id)))?;

        if !booking.is_active() {
            return Err(reject(BookingError::AlreadyCancelled));
        }

        let now = section.now();
        if let Some(event) = section.load().await? {
            if event.has_started(now) {
                return Err(reject(BookingError::EventAlreadyStarted));
            }
        }

        let cancelled = booking.cancel(now);
        self.bookings.put_booking(cancelled.clone()).await?;

        match section.release(booking.seats).await {
            Ok(event) => {
                tracing::info!(occupancy = event.occupancy, "Booking cancelled");
            }
            Err(BookingError::EventNotFound(event_id)) => {
                tracing::warn!(
                    event_id = %event_id,
                    "Booking cancelled but its event no longer exists, nothing to release"
                );
            }
            Err(release_error) => {
                if let Err(restore_error) = self.bookings.put_booking(booking).await {
                    tracing::error!(
                        release_error = %release_error,
                        restore_error = %restore_error,
                        "Seat release failed and the booking could not be restored"
                    );
                }
                return Err(release_error);
            }
        }

        Ok(cancelled)
    }

    /// Bookings held by `user_id`, newest first, each joined with its event.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if a read fails.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn user_bookings(
        &self,
        user_id: &UserId,
        include_cancelled: bool,
    ) -> Result<Vec<BookingView>, BookingError> {
        let status = if include_cancelled {
            None
        } else {
            Some(BookingStatus::Confirmed)
        };
        let bookings = self.bookings.list_user_bookings(user_id, status).await?;

        let mut events: HashMap<EventId, Option<Event>> = HashMap::new();
        let mut views = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let event = match events.get(&booking.event_id) {
                Some(cached) => cached.clone(),
                None => {
                    let loaded = self.admission.events().get_event(booking.event_id).await?;
                    events.insert(booking.event_id, loaded.clone());
                    loaded
                }
            };
            views.push(BookingView { booking, event });
        }
        Ok(views)
    }

    /// Confirmed bookings for `event_id`, oldest first.
    ///
    /// # Errors
    ///
    /// - `EventNotFound`: no such event
    /// - `Storage`: a read failed
    #[tracing::instrument(skip(self), fields(event_id = %event_id))]
    pub async fn event_attendees(&self, event_id: EventId) -> Result<Vec<Booking>, BookingError> {
        if self.admission.events().get_event(event_id).await?.is_none() {
            return Err(BookingError::EventNotFound(event_id));
        }
        Ok(self
            .bookings
            .list_event_bookings(event_id, Some(BookingStatus::Confirmed))
            .await?)
    }
}
