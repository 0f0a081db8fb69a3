//! # EventEase Testing
//!
//! Testing utilities for the EventEase booking engine.
//!
//! This crate provides:
//! - Mock implementations of environment traits ([`FixedClock`], [`ManualClock`])
//! - In-memory stores with scripted fault injection
//! - Builders for events and bookings
//!
//! ## Example
//!
//! ```
//! use eventease_testing::{InMemoryEventStore, fixtures::EventBuilder, test_clock};
//! use eventease_core::store::EventStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryEventStore::new();
//! let event = EventBuilder::new(test_clock()).capacity(2).build();
//! store.put_event(event.clone()).await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use eventease_core::environment::Clock;

pub mod store_mocks;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use eventease_testing::mocks::FixedClock;
    /// use eventease_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep one handle and hand
    /// another to the code under test.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward by `by`
        pub fn advance(&self, by: chrono::Duration) {
            if let Ok(mut time) = self.time.write() {
                *time += by;
            }
        }

        /// Jump to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            if let Ok(mut current) = self.time.write() {
                *current = time;
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
                .read()
                .map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
        }
    }

    /// The instant every test clock starts at (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// Create a manual clock starting at the test epoch
    #[must_use]
    pub fn manual_clock() -> ManualClock {
        ManualClock::new(test_epoch())
    }
}

/// Builders for domain records.
pub mod fixtures {
    use super::Clock;
    use chrono::{DateTime, Duration, Utc};
    use eventease_core::{Booking, BusinessId, Event, EventDraft, EventId, UserId};

    /// Builder for [`Event`] records with sensible defaults.
    ///
    /// Defaults: capacity 10, no seats taken, starting seven days after the
    /// clock's "now".
    #[derive(Debug, Clone)]
    pub struct EventBuilder {
        now: DateTime<Utc>,
        event: Event,
    }

    impl EventBuilder {
        /// Start a builder relative to `clock`
        #[must_use]
        pub fn new(clock: impl Clock) -> Self {
            let now = clock.now();
            let starts_at = now + Duration::days(7);
            Self {
                now,
                event: Event {
                    id: EventId::new(),
                    business_id: BusinessId::generate(starts_at),
                    name: "Rust Meetup".to_string(),
                    description: "Monthly community meetup".to_string(),
                    category: "Technology".to_string(),
                    location: "Main Hall".to_string(),
                    starts_at,
                    capacity: 10,
                    occupancy: 0,
                    created_at: now,
                    updated_at: now,
                },
            }
        }

        /// Set the id
        #[must_use]
        pub const fn id(mut self, id: EventId) -> Self {
            self.event.id = id;
            self
        }

        /// Set the business id
        #[must_use]
        pub fn business_id(mut self, id: &str) -> Self {
            self.event.business_id = BusinessId::from_string(id);
            self
        }

        /// Set the name
        #[must_use]
        pub fn name(mut self, name: &str) -> Self {
            self.event.name = name.to_string();
            self
        }

        /// Set the capacity
        #[must_use]
        pub const fn capacity(mut self, capacity: u32) -> Self {
            self.event.capacity = capacity;
            self
        }

        /// Set the number of seats already taken
        #[must_use]
        pub const fn occupancy(mut self, occupancy: u32) -> Self {
            self.event.occupancy = occupancy;
            self
        }

        /// Start `offset` after the builder's "now" (negative for the past)
        #[must_use]
        pub fn starts_in(mut self, offset: Duration) -> Self {
            self.event.starts_at = self.now + offset;
            self
        }

        /// Start at an absolute time
        #[must_use]
        pub const fn starts_at(mut self, starts_at: DateTime<Utc>) -> Self {
            self.event.starts_at = starts_at;
            self
        }

        /// Finish
        #[must_use]
        pub fn build(self) -> Event {
            self.event
        }
    }

    /// A valid draft for an event starting `starts_in` after `clock`'s now.
    #[must_use]
    pub fn draft(clock: &impl Clock, capacity: u32, starts_in: Duration) -> EventDraft {
        EventDraft {
            name: "Rust Meetup".to_string(),
            description: "Monthly community meetup".to_string(),
            category: "Technology".to_string(),
            location: "Main Hall".to_string(),
            starts_at: clock.now() + starts_in,
            capacity,
        }
    }

    /// A confirmed booking of `seats` on `event` by `user`.
    #[must_use]
    pub fn confirmed_booking(clock: &impl Clock, user: &str, event: &Event, seats: u32) -> Booking {
        Booking::confirmed(UserId::new(user), event.id, seats, clock.now())
    }
}

/// Test helpers.
pub mod helpers {
    use tracing_subscriber::EnvFilter;

    /// Install a test-writer tracing subscriber once per process.
    ///
    /// Honors `RUST_LOG`; later calls are no-ops.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, manual_clock, test_clock, test_epoch};
pub use store_mocks::{InMemoryBookingStore, InMemoryEventStore, StoreOp};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = manual_clock();
        let handle = clock.clone();
        handle.advance(chrono::Duration::hours(3));
        assert_eq!(clock.now(), test_epoch() + chrono::Duration::hours(3));

        clock.set(test_epoch());
        assert_eq!(handle.now(), test_epoch());
    }

    #[test]
    fn event_builder_defaults_to_future_event_with_free_seats() {
        let clock = test_clock();
        let event = fixtures::EventBuilder::new(clock.clone()).build();
        assert!(!event.has_started(clock.now()));
        assert_eq!(event.available_seats(), 10);
    }
}
