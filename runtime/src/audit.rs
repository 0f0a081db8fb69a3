//! Booking activity hook.
//!
//! The lifecycle manager reports every booking request and its outcome to a
//! [`BookingObserver`]. Observers are diagnostic only: they cannot fail an
//! operation and nothing reads their output back.

use eventease_core::{Booking, BookingError, EventId, UserId};

/// Receives booking lifecycle notifications.
///
/// All methods default to no-ops.
pub trait BookingObserver: Send + Sync {
    /// A user asked for seats on an event.
    fn requested(&self, _user_id: &UserId, _event_id: EventId, _seats: u32) {}

    /// A booking was confirmed.
    fn confirmed(&self, _booking: &Booking) {}

    /// A create or cancel request was turned down.
    fn rejected(&self, _user_id: &UserId, _event_id: Option<EventId>, _error: &BookingError) {}

    /// A booking was cancelled and its seats handed back.
    fn cancelled(&self, _booking: &Booking) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BookingObserver for NoopObserver {}

/// Writes structured records under the `eventease::audit` target.
///
/// Filter them with `RUST_LOG=eventease::audit=info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl BookingObserver for TracingObserver {
    fn requested(&self, user_id: &UserId, event_id: EventId, seats: u32) {
        tracing::info!(
            target: "eventease::audit",
            user_id = %user_id,
            event_id = %event_id,
            seats,
            "booking requested"
        );
    }

    fn confirmed(&self, booking: &Booking) {
        tracing::info!(
            target: "eventease::audit",
            booking_id = %booking.id,
            user_id = %booking.user_id,
            event_id = %booking.event_id,
            seats = booking.seats,
            "booking confirmed"
        );
    }

    fn rejected(&self, user_id: &UserId, event_id: Option<EventId>, error: &BookingError) {
        tracing::info!(
            target: "eventease::audit",
            user_id = %user_id,
            event_id = ?event_id,
            reason = error.reason(),
            error = %error,
            "booking rejected"
        );
    }

    fn cancelled(&self, booking: &Booking) {
        tracing::info!(
            target: "eventease::audit",
            booking_id = %booking.id,
            user_id = %booking.user_id,
            event_id = %booking.event_id,
            seats = booking.seats,
            "booking cancelled"
        );
    }
}
