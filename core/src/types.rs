//! Domain types for the EventEase booking engine.
//!
//! This module contains the identifiers, entities and value objects shared by every
//! crate in the workspace. Derived views such as [`EventStatus`] are computed from
//! stored data on demand and are never persisted.

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Smallest number of seats a single booking may hold.
pub const MIN_SEATS_PER_BOOKING: u32 = 1;

/// Largest number of seats a single booking may hold.
pub const MAX_SEATS_PER_BOOKING: u32 = 2;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Creates a new random `BookingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `BookingId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a user, as issued by the user directory.
///
/// The booking engine treats it as opaque: it is compared for equality and
/// stored, never parsed or validated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a directory-issued user id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role attached to a caller by the user directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular attendee
    #[default]
    User,
    /// Organizer allowed to manage the event catalog
    Admin,
}

impl Role {
    /// Parse a role name, case-insensitively. Unknown names yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Human-facing event identifier, e.g. `EVT-AUG2025-X4T`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessId(String);

impl BusinessId {
    const SUFFIX_ALPHABET: &'static [u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    const MONTHS: [&'static str; 12] = [
        "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
    ];

    /// Generate a business id for an event starting at `starts_at`.
    ///
    /// Format: `EVT-<MON><YYYY>-<XXX>`, where the suffix is three random
    /// upper-case alphanumerics.
    #[must_use]
    pub fn generate(starts_at: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..3)
            .map(|_| {
                let idx = rng.gen_range(0..Self::SUFFIX_ALPHABET.len());
                char::from(Self::SUFFIX_ALPHABET[idx])
            })
            .collect();
        Self::from_parts(starts_at, &suffix)
    }

    fn from_parts(starts_at: DateTime<Utc>, suffix: &str) -> Self {
        let month = Self::MONTHS[starts_at.month0() as usize];
        Self(format!("EVT-{month}{}-{suffix}", starts_at.year()))
    }

    /// Wrap an already issued business id (e.g. loaded from storage)
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusinessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Event
// ============================================================================

/// Schedule-derived status of an event.
///
/// Computed by comparing calendar days (UTC) of the start time and "now".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    /// Starts on a later day
    Upcoming,
    /// Starts today
    Ongoing,
    /// Started on an earlier day
    Completed,
}

/// An event with finite seating capacity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Opaque identifier
    pub id: EventId,
    /// Human-facing identifier
    pub business_id: BusinessId,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Category (e.g. Music, Tech)
    pub category: String,
    /// Location ("Online" or a physical address)
    pub location: String,
    /// Scheduled start
    pub starts_at: DateTime<Utc>,
    /// Maximum number of seats (always > 0)
    pub capacity: u32,
    /// Seats currently held by confirmed bookings
    pub occupancy: u32,
    /// When the event was created
    pub created_at: DateTime<Utc>,
    /// When the event was last written
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Seats still available for admission
    #[must_use]
    pub const fn available_seats(&self) -> u32 {
        self.capacity.saturating_sub(self.occupancy)
    }

    /// Whether the event has started at `now`
    #[must_use]
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now
    }

    /// Derived schedule status at `now`
    #[must_use]
    pub fn status(&self, now: DateTime<Utc>) -> EventStatus {
        let event_day = self.starts_at.date_naive();
        let today = now.date_naive();

        match event_day.cmp(&today) {
            std::cmp::Ordering::Less => EventStatus::Completed,
            std::cmp::Ordering::Equal => EventStatus::Ongoing,
            std::cmp::Ordering::Greater => EventStatus::Upcoming,
        }
    }
}

/// Input for creating an event through the catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventDraft {
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Category
    pub category: String,
    /// Location
    pub location: String,
    /// Scheduled start
    pub starts_at: DateTime<Utc>,
    /// Maximum number of seats
    pub capacity: u32,
}

/// Partial update of an event's descriptive fields.
///
/// `None` leaves the field unchanged.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventPatch {
    /// New display name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New category
    pub category: Option<String>,
    /// New location
    pub location: Option<String>,
    /// New start time
    pub starts_at: Option<DateTime<Utc>>,
    /// New capacity
    pub capacity: Option<u32>,
}

// ============================================================================
// Booking
// ============================================================================

/// Status of a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Holds its seats
    Confirmed,
    /// Seats were given back; terminal
    Cancelled,
}

impl BookingStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the storage representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A user's reservation of seats on one event.
///
/// Append-only: created `Confirmed`, transitions once to `Cancelled`, never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Opaque identifier
    pub id: BookingId,
    /// Who holds the seats
    pub user_id: UserId,
    /// Which event the seats belong to
    pub event_id: EventId,
    /// Number of seats (1 or 2)
    pub seats: u32,
    /// Current status
    pub status: BookingStatus,
    /// When the booking was confirmed
    pub created_at: DateTime<Utc>,
    /// When the booking was cancelled, if it was
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// A freshly confirmed booking
    #[must_use]
    pub fn confirmed(user_id: UserId, event_id: EventId, seats: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: BookingId::new(),
            user_id,
            event_id,
            seats,
            status: BookingStatus::Confirmed,
            created_at: now,
            cancelled_at: None,
        }
    }

    /// Whether the booking still holds its seats
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    /// The cancelled copy of this booking
    #[must_use]
    pub fn cancel(&self, now: DateTime<Utc>) -> Self {
        Self {
            status: BookingStatus::Cancelled,
            cancelled_at: Some(now),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().unwrap_or_default()
    }

    fn event(starts_at: DateTime<Utc>) -> Event {
        Event {
            id: EventId::new(),
            business_id: BusinessId::from_string("EVT-JAN2025-AAA"),
            name: "Rust Meetup".to_string(),
            description: String::new(),
            category: "Tech".to_string(),
            location: "Online".to_string(),
            starts_at,
            capacity: 10,
            occupancy: 3,
            created_at: starts_at,
            updated_at: starts_at,
        }
    }

    #[test]
    fn business_id_uses_month_and_year_of_start() {
        let id = BusinessId::from_parts(at(2025, 8, 14, 18), "X4T");
        assert_eq!(id.as_str(), "EVT-AUG2025-X4T");
    }

    #[test]
    fn generated_business_id_has_expected_shape() {
        let id = BusinessId::generate(at(2026, 12, 1, 9));
        let s = id.as_str();
        assert!(s.starts_with("EVT-DEC2026-"));
        let suffix = &s["EVT-DEC2026-".len()..];
        assert_eq!(suffix.len(), 3);
        assert!(suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn status_is_derived_from_calendar_day() {
        let e = event(at(2025, 3, 10, 20));
        assert_eq!(e.status(at(2025, 3, 9, 23)), EventStatus::Upcoming);
        assert_eq!(e.status(at(2025, 3, 10, 1)), EventStatus::Ongoing);
        assert_eq!(e.status(at(2025, 3, 10, 22)), EventStatus::Ongoing);
        assert_eq!(e.status(at(2025, 3, 11, 0)), EventStatus::Completed);
    }

    #[test]
    fn has_started_is_inclusive_of_start_instant() {
        let start = at(2025, 3, 10, 20);
        let e = event(start);
        assert!(!e.has_started(at(2025, 3, 10, 19)));
        assert!(e.has_started(start));
    }

    #[test]
    fn available_seats_never_underflows() {
        let mut e = event(at(2025, 3, 10, 20));
        e.occupancy = 12;
        assert_eq!(e.available_seats(), 0);
    }

    #[test]
    fn cancel_keeps_identity_and_stamps_time() {
        let now = at(2025, 1, 1, 0);
        let booking = Booking::confirmed(UserId::new("u-1"), EventId::new(), 2, now);
        let later = at(2025, 1, 2, 0);
        let cancelled = booking.cancel(later);

        assert_eq!(cancelled.id, booking.id);
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.cancelled_at, Some(later));
        assert!(!cancelled.is_active());
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("Admin"), Some(Role::Admin));
        assert_eq!(Role::parse(" user "), Some(Role::User));
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn booking_status_round_trips_through_storage_form() {
        for status in [BookingStatus::Confirmed, BookingStatus::Cancelled] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
    }
}
