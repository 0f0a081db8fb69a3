//! Booking endpoints.
//!
//! - `POST /api/bookings` - Book 1 or 2 seats on an event
//! - `GET /api/bookings/mine` - The caller's bookings with event summaries
//! - `PUT /api/bookings/:id/cancel` - Cancel one of the caller's bookings

use crate::server::AppState;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use eventease_core::{Booking, BookingId, BookingStatus, BusinessId, EventId, EventStatus, UserId};
use eventease_runtime::BookingView;
use eventease_web::{Caller, WebResult};
use serde::{Deserialize, Serialize};

/// Request to book seats.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    /// Event to book
    pub event_id: EventId,
    /// Number of seats (1 or 2). Any JSON number is accepted here so that
    /// out-of-range values are rejected by admission, after the event checks.
    #[serde(default)]
    pub seats: Option<f64>,
}

impl CreateBookingRequest {
    /// Requested seats as a count. Missing, negative or fractional values map
    /// to 0, which admission rejects as `InvalidSeatCount`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn seat_count(&self) -> u32 {
        match self.seats {
            Some(seats) if seats.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&seats) => {
                seats as u32
            }
            _ => 0,
        }
    }
}

/// Booking response.
#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    /// Booking ID
    pub id: BookingId,
    /// Holder
    pub user_id: UserId,
    /// Booked event
    pub event_id: EventId,
    /// Seats held
    pub seats: u32,
    /// Confirmed or Cancelled
    pub status: BookingStatus,
    /// When the booking was confirmed
    pub created_at: DateTime<Utc>,
    /// When the booking was cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            user_id: booking.user_id,
            event_id: booking.event_id,
            seats: booking.seats,
            status: booking.status,
            created_at: booking.created_at,
            cancelled_at: booking.cancelled_at,
        }
    }
}

/// Event fields shown next to a booking.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventSummary {
    /// Human-facing identifier
    pub business_id: BusinessId,
    /// Display name
    pub name: String,
    /// Location
    pub location: String,
    /// Scheduled start
    pub starts_at: DateTime<Utc>,
    /// Schedule-derived status
    pub status: EventStatus,
}

/// One entry of `GET /api/bookings/mine`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MyBookingResponse {
    /// The booking
    #[serde(flatten)]
    pub booking: BookingResponse,
    /// Its event; absent if the event was deleted
    pub event: Option<EventSummary>,
}

impl MyBookingResponse {
    fn at(view: BookingView, now: DateTime<Utc>) -> Self {
        Self {
            event: view.event.map(|event| EventSummary {
                status: event.status(now),
                business_id: event.business_id,
                name: event.name,
                location: event.location,
                starts_at: event.starts_at,
            }),
            booking: view.booking.into(),
        }
    }
}

/// Query parameters for listing the caller's bookings.
#[derive(Debug, Default, Deserialize)]
pub struct MyBookingsQuery {
    /// Include cancelled bookings (default: false)
    #[serde(default)]
    pub include_cancelled: bool,
}

/// Book seats on an event.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/bookings \
///   -H "X-User-Id: alice" -H "Content-Type: application/json" \
///   -d '{"event_id":"550e8400-e29b-41d4-a716-446655440000","seats":2}'
/// ```
pub async fn create_booking(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> WebResult<(StatusCode, Json<BookingResponse>)> {
    let Json(request) = body?;
    let booking = state
        .engine
        .lifecycle
        .create_booking(&caller.user_id, request.event_id, request.seat_count())
        .await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// List the caller's bookings, newest first.
///
/// ```bash
/// curl "http://localhost:8080/api/bookings/mine?include_cancelled=true" -H "X-User-Id: alice"
/// ```
pub async fn list_my_bookings(
    State(state): State<AppState>,
    caller: Caller,
    query: Result<Query<MyBookingsQuery>, QueryRejection>,
) -> WebResult<Json<Vec<MyBookingResponse>>> {
    let Query(query) = query?;
    let now = state.engine.lifecycle.admission().now();
    let views = state
        .engine
        .lifecycle
        .user_bookings(&caller.user_id, query.include_cancelled)
        .await?;
    Ok(Json(
        views
            .into_iter()
            .map(|view| MyBookingResponse::at(view, now))
            .collect(),
    ))
}

/// Cancel one of the caller's bookings and give its seats back.
pub async fn cancel_booking(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<BookingId>, PathRejection>,
) -> WebResult<Json<BookingResponse>> {
    let Path(id) = path?;
    let booking = state
        .engine
        .lifecycle
        .cancel_booking(&caller.user_id, id)
        .await?;
    Ok(Json(booking.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(seats: Option<f64>) -> CreateBookingRequest {
        CreateBookingRequest {
            event_id: EventId::new(),
            seats,
        }
    }

    #[test]
    fn seat_count_keeps_whole_numbers() {
        assert_eq!(request(Some(1.0)).seat_count(), 1);
        assert_eq!(request(Some(2.0)).seat_count(), 2);
        assert_eq!(request(Some(7.0)).seat_count(), 7);
    }

    #[test]
    fn seat_count_maps_unusable_values_to_zero() {
        for seats in [None, Some(-1.0), Some(1.5), Some(f64::NAN), Some(1e12)] {
            assert_eq!(request(seats).seat_count(), 0, "{seats:?}");
        }
    }
}
