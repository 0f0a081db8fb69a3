//! Pure admission rules.
//!
//! These functions decide whether a seat reservation or release may be applied to
//! an event and compute the resulting occupancy. They perform no I/O; the runtime's
//! admission controller calls them inside a per-event critical section and writes
//! the result back.
//!
//! Reservation preconditions are checked in a fixed order and the first failure
//! wins:
//!
//! ```text
//! event exists            → EventNotFound
//! event not yet started   → EventPassed
//! seats ∈ {1, 2}          → InvalidSeatCount
//! occupancy + seats ≤ cap → CapacityExceeded
//! ```

use crate::error::BookingError;
use crate::types::{Event, EventId, MAX_SEATS_PER_BOOKING, MIN_SEATS_PER_BOOKING};
use chrono::{DateTime, Utc};

/// Whether `seats` is a valid size for one booking.
#[must_use]
pub const fn is_valid_seat_count(seats: u32) -> bool {
    seats >= MIN_SEATS_PER_BOOKING && seats <= MAX_SEATS_PER_BOOKING
}

/// Decide a reservation of `seats` on `event` at `now`.
///
/// Returns the occupancy the event will have once the reservation is applied.
///
/// # Errors
///
/// Returns the first failing precondition, see the module docs.
pub fn decide_reservation(
    event_id: EventId,
    event: Option<&Event>,
    seats: u32,
    now: DateTime<Utc>,
) -> Result<u32, BookingError> {
    let event = event.ok_or(BookingError::EventNotFound(event_id))?;

    if event.has_started(now) {
        return Err(BookingError::EventPassed);
    }

    if !is_valid_seat_count(seats) {
        return Err(BookingError::InvalidSeatCount(seats));
    }

    let available = event.available_seats();
    if seats > available {
        return Err(BookingError::CapacityExceeded {
            requested: seats,
            available,
        });
    }

    Ok(event.occupancy + seats)
}

/// Decide a release of `seats` on `event`.
///
/// Occupancy is floored at zero; callers are expected to release only what they
/// reserved earlier.
///
/// # Errors
///
/// Returns [`BookingError::EventNotFound`] if the event no longer exists.
pub fn decide_release(
    event_id: EventId,
    event: Option<&Event>,
    seats: u32,
) -> Result<u32, BookingError> {
    let event = event.ok_or(BookingError::EventNotFound(event_id))?;
    Ok(event.occupancy.saturating_sub(seats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BusinessId;
    use chrono::Duration;
    use proptest::prelude::*;

    fn event(capacity: u32, occupancy: u32, starts_in: Duration) -> (Event, DateTime<Utc>) {
        let now = DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_000);
        let event = Event {
            id: EventId::new(),
            business_id: BusinessId::from_string("EVT-TEST"),
            name: "Concert".to_string(),
            description: String::new(),
            category: "Music".to_string(),
            location: "Hall A".to_string(),
            starts_at: now + starts_in,
            capacity,
            occupancy,
            created_at: now,
            updated_at: now,
        };
        (event, now)
    }

    #[test]
    fn missing_event_is_not_found() {
        let id = EventId::new();
        let result = decide_reservation(id, None, 1, Utc::now());
        assert_eq!(result, Err(BookingError::EventNotFound(id)));
    }

    #[test]
    fn started_event_is_rejected_before_seat_validation() {
        let (e, now) = event(10, 0, Duration::hours(-1));
        // Invalid seat count too, but EventPassed is checked first
        let result = decide_reservation(e.id, Some(&e), 7, now);
        assert_eq!(result, Err(BookingError::EventPassed));
    }

    #[test]
    fn seat_count_is_validated_before_capacity() {
        let (e, now) = event(2, 2, Duration::days(1));
        assert_eq!(
            decide_reservation(e.id, Some(&e), 0, now),
            Err(BookingError::InvalidSeatCount(0))
        );
        assert_eq!(
            decide_reservation(e.id, Some(&e), 3, now),
            Err(BookingError::InvalidSeatCount(3))
        );
    }

    #[test]
    fn capacity_exceeded_reports_availability() {
        let (e, now) = event(2, 1, Duration::days(1));
        assert_eq!(
            decide_reservation(e.id, Some(&e), 2, now),
            Err(BookingError::CapacityExceeded {
                requested: 2,
                available: 1
            })
        );
    }

    #[test]
    fn reservation_filling_last_seats_succeeds() {
        let (e, now) = event(2, 0, Duration::days(1));
        assert_eq!(decide_reservation(e.id, Some(&e), 2, now), Ok(2));
    }

    #[test]
    fn release_floors_at_zero() {
        let (e, _) = event(2, 1, Duration::days(1));
        assert_eq!(decide_release(e.id, Some(&e), 2), Ok(0));
    }

    #[test]
    fn release_of_missing_event_is_not_found() {
        let id = EventId::new();
        assert_eq!(
            decide_release(id, None, 1),
            Err(BookingError::EventNotFound(id))
        );
    }

    proptest! {
        #[test]
        fn admitted_occupancy_never_exceeds_capacity(
            capacity in 1u32..500,
            occupancy_frac in 0.0f64..=1.0,
            seats in 0u32..5,
        ) {
            let occupancy = (f64::from(capacity) * occupancy_frac) as u32;
            let (e, now) = event(capacity, occupancy, Duration::days(3));

            match decide_reservation(e.id, Some(&e), seats, now) {
                Ok(next) => {
                    prop_assert!(next <= capacity);
                    prop_assert_eq!(next, occupancy + seats);
                    prop_assert!(is_valid_seat_count(seats));
                }
                Err(BookingError::InvalidSeatCount(n)) => prop_assert!(!is_valid_seat_count(n)),
                Err(BookingError::CapacityExceeded { requested, available }) => {
                    prop_assert!(requested > available);
                    prop_assert_eq!(available, capacity - occupancy);
                }
                Err(other) => prop_assert!(false, "unexpected rejection {other:?}"),
            }
        }

        #[test]
        fn reserve_then_release_restores_occupancy(
            capacity in 2u32..200,
            seats in 1u32..=2,
        ) {
            let (mut e, now) = event(capacity, 0, Duration::days(3));
            let reserved = decide_reservation(e.id, Some(&e), seats, now);
            prop_assert_eq!(reserved, Ok(seats));
            e.occupancy = seats;
            prop_assert_eq!(decide_release(e.id, Some(&e), seats), Ok(0));
        }
    }
}
