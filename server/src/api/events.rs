//! Event catalog endpoints.
//!
//! - `GET /api/events` - List events, soonest first
//! - `GET /api/events/:id` - Event details with derived status and availability
//! - `POST /api/events` - Create an event (admin)
//! - `PUT /api/events/:id` - Partial update (admin)
//! - `DELETE /api/events/:id` - Delete an event without confirmed bookings (admin)
//! - `GET /api/events/:id/attendees` - Confirmed bookings for an event (admin)

use super::bookings::BookingResponse;
use crate::server::AppState;
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use eventease_core::{BusinessId, Event, EventDraft, EventId, EventPatch, EventStatus};
use eventease_web::{AdminCaller, WebResult};
use serde::{Deserialize, Serialize};

/// Event details response.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    /// Event ID
    pub id: EventId,
    /// Human-facing identifier
    pub business_id: BusinessId,
    /// Display name
    pub name: String,
    /// Description
    pub description: String,
    /// Category
    pub category: String,
    /// Location
    pub location: String,
    /// Scheduled start
    pub starts_at: DateTime<Utc>,
    /// Total seats
    pub capacity: u32,
    /// Seats held by confirmed bookings
    pub occupancy: u32,
    /// Seats still open
    pub available_seats: u32,
    /// Schedule-derived status
    pub status: EventStatus,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last write timestamp
    pub updated_at: DateTime<Utc>,
}

impl EventResponse {
    /// Project an event as seen at `now`.
    #[must_use]
    pub fn at(event: Event, now: DateTime<Utc>) -> Self {
        Self {
            available_seats: event.available_seats(),
            status: event.status(now),
            id: event.id,
            business_id: event.business_id,
            name: event.name,
            description: event.description,
            category: event.category,
            location: event.location,
            starts_at: event.starts_at,
            capacity: event.capacity,
            occupancy: event.occupancy,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

/// List events, soonest first.
///
/// ```bash
/// curl http://localhost:8080/api/events
/// ```
pub async fn list_events(State(state): State<AppState>) -> WebResult<Json<Vec<EventResponse>>> {
    let now = state.engine.lifecycle.admission().now();
    let events = state.engine.catalog.list_events().await?;
    Ok(Json(
        events.into_iter().map(|e| EventResponse::at(e, now)).collect(),
    ))
}

/// Get event details by ID.
///
/// ```bash
/// curl http://localhost:8080/api/events/550e8400-e29b-41d4-a716-446655440000
/// ```
pub async fn get_event(
    State(state): State<AppState>,
    path: Result<Path<EventId>, PathRejection>,
) -> WebResult<Json<EventResponse>> {
    let Path(id) = path?;
    let now = state.engine.lifecycle.admission().now();
    let event = state.engine.catalog.get_event(id).await?;
    Ok(Json(EventResponse::at(event, now)))
}

/// Create a new event.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/events \
///   -H "X-User-Id: olivia" -H "X-User-Role: admin" \
///   -H "Content-Type: application/json" \
///   -d '{"name":"Rust Meetup","category":"Tech","location":"Online",
///        "starts_at":"2025-09-01T18:00:00Z","capacity":50}'
/// ```
pub async fn create_event(
    State(state): State<AppState>,
    AdminCaller(caller): AdminCaller,
    body: Result<Json<EventDraft>, JsonRejection>,
) -> WebResult<(StatusCode, Json<EventResponse>)> {
    let Json(draft) = body?;
    let now = state.engine.lifecycle.admission().now();
    let event = state.engine.catalog.create_event(draft).await?;

    tracing::info!(
        event_id = %event.id,
        business_id = %event.business_id,
        admin = %caller.user_id,
        "Event created"
    );
    Ok((StatusCode::CREATED, Json(EventResponse::at(event, now))))
}

/// Update an event's descriptive fields or capacity.
pub async fn update_event(
    State(state): State<AppState>,
    AdminCaller(caller): AdminCaller,
    path: Result<Path<EventId>, PathRejection>,
    body: Result<Json<EventPatch>, JsonRejection>,
) -> WebResult<Json<EventResponse>> {
    let Path(id) = path?;
    let Json(patch) = body?;
    let now = state.engine.lifecycle.admission().now();
    let event = state.engine.catalog.update_event(id, patch).await?;

    tracing::info!(event_id = %id, admin = %caller.user_id, "Event updated");
    Ok(Json(EventResponse::at(event, now)))
}

/// Delete an event.
pub async fn delete_event(
    State(state): State<AppState>,
    AdminCaller(caller): AdminCaller,
    path: Result<Path<EventId>, PathRejection>,
) -> WebResult<StatusCode> {
    let Path(id) = path?;
    state.engine.catalog.delete_event(id).await?;

    tracing::info!(event_id = %id, admin = %caller.user_id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Confirmed bookings for an event, oldest first.
pub async fn list_attendees(
    State(state): State<AppState>,
    AdminCaller(_): AdminCaller,
    path: Result<Path<EventId>, PathRejection>,
) -> WebResult<Json<Vec<BookingResponse>>> {
    let Path(id) = path?;
    let attendees = state.engine.lifecycle.event_attendees(id).await?;
    Ok(Json(attendees.into_iter().map(BookingResponse::from).collect()))
}
