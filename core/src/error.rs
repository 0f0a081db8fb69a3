//! Error taxonomy for the booking engine.
//!
//! Every rejection is a recoverable business outcome returned to the caller.
//! [`StoreError`] wraps persistence failures; it is the only class that may be
//! retried, and only by the persistence layer.

use crate::types::{BookingId, EventId};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The record to update does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database connection or query error.
    #[error("Database error: {message}")]
    Database {
        /// Driver message
        message: String,
        /// Whether retrying the same operation may succeed
        transient: bool,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// A database error that is worth retrying (pool exhausted, I/O hiccup).
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            transient: true,
        }
    }

    /// A database error that will fail again if retried.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            transient: false,
        }
    }

    /// Whether the persistence layer should retry the operation.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Database { transient: true, .. })
    }
}

/// Outcome of a rejected booking-engine operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// The event does not exist.
    #[error("Event {0} not found")]
    EventNotFound(EventId),

    /// The booking does not exist.
    #[error("Booking {0} not found")]
    BookingNotFound(BookingId),

    /// Reservations are closed because the event has already started.
    #[error("This event has already passed")]
    EventPassed,

    /// Seat count outside the allowed range.
    #[error("Invalid seat count {0}: a booking holds a minimum of 1 and a maximum of 2 seats")]
    InvalidSeatCount(u32),

    /// Not enough seats left.
    #[error("Event is at full capacity: requested {requested}, available {available}")]
    CapacityExceeded {
        /// Seats asked for
        requested: u32,
        /// Seats left at decision time
        available: u32,
    },

    /// The caller already holds a confirmed booking for this event.
    #[error("You have already booked this event")]
    AlreadyBooked,

    /// The caller does not own the booking.
    #[error("User not authorized for this booking")]
    NotAuthorized,

    /// The booking was cancelled before.
    #[error("Booking is already cancelled")]
    AlreadyCancelled,

    /// Cancellation is refused once the event has started.
    #[error("Cannot cancel a booking for an event that has already started")]
    EventAlreadyStarted,

    /// The per-event critical section could not be entered in time.
    #[error("Event is busy, gave up after {}ms", waited.as_millis())]
    Busy {
        /// How long the caller waited
        waited: Duration,
    },

    /// Catalog input failed validation.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// The event cannot be deleted while confirmed bookings reference it.
    #[error("Event still has {active} active booking(s)")]
    EventHasActiveBookings {
        /// Number of confirmed bookings
        active: usize,
    },

    /// Persistence failed.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// The task running the operation ended without producing an outcome.
    #[error("Booking operation did not complete: {0}")]
    Interrupted(String),
}

impl BookingError {
    /// Stable machine-readable reason code.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::EventNotFound(_) => "EVENT_NOT_FOUND",
            Self::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            Self::EventPassed => "EVENT_PASSED",
            Self::InvalidSeatCount(_) => "INVALID_SEAT_COUNT",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::AlreadyBooked => "ALREADY_BOOKED",
            Self::NotAuthorized => "NOT_AUTHORIZED",
            Self::AlreadyCancelled => "ALREADY_CANCELLED",
            Self::EventAlreadyStarted => "EVENT_ALREADY_STARTED",
            Self::Busy { .. } => "BUSY",
            Self::InvalidEvent(_) => "INVALID_EVENT",
            Self::EventHasActiveBookings { .. } => "EVENT_HAS_ACTIVE_BOOKINGS",
            Self::Storage(_) => "STORAGE_FAILURE",
            Self::Interrupted(_) => "INTERRUPTED",
        }
    }

    /// Whether the caller may retry the same request later.
    ///
    /// Business-rule violations never are; contention and transient storage
    /// failures are.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Busy { .. } => true,
            Self::Storage(err) => err.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_exceeded_display() {
        let error = BookingError::CapacityExceeded {
            requested: 2,
            available: 1,
        };

        let display = format!("{error}");
        assert!(display.contains("requested 2"));
        assert!(display.contains("available 1"));
    }

    #[test]
    fn storage_error_is_transparent() {
        let error = BookingError::from(StoreError::transient("pool timed out"));
        assert_eq!(error.to_string(), "Database error: pool timed out");
        assert_eq!(error.reason(), "STORAGE_FAILURE");
    }

    #[test]
    fn only_contention_and_transient_storage_are_retryable() {
        assert!(BookingError::Busy {
            waited: Duration::from_millis(10)
        }
        .is_retryable());
        assert!(BookingError::Storage(StoreError::transient("io")).is_retryable());
        assert!(!BookingError::Storage(StoreError::permanent("syntax")).is_retryable());
        assert!(!BookingError::CapacityExceeded {
            requested: 1,
            available: 0
        }
        .is_retryable());
        assert!(!BookingError::AlreadyBooked.is_retryable());
    }
}
