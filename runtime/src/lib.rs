//! # EventEase Runtime
//!
//! The imperative shell around `eventease-core`: per-event locking, booking
//! orchestration, catalog writes, store retries and metrics.
//!
//! ## Core Components
//!
//! - **[`AdmissionController`]**: the only writer of event occupancy; serializes
//!   reserve/release per event with a bounded wait
//! - **[`BookingLifecycle`]**: create/cancel bookings as atomic units with
//!   compensating release
//! - **[`EventCatalog`]**: organizer CRUD routed through the same per-event sections
//! - **[`retry::Retrying`]**: store decorator retrying transient failures
//!
//! ## Example
//!
//! ```
//! use eventease_runtime::BookingEngine;
//! use eventease_runtime::admission::AdmissionConfig;
//! use eventease_testing::{InMemoryBookingStore, InMemoryEventStore, fixtures, test_clock};
//! use eventease_core::UserId;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), eventease_core::BookingError> {
//! let engine = BookingEngine::new(
//!     Arc::new(InMemoryEventStore::new()),
//!     Arc::new(InMemoryBookingStore::new()),
//!     Arc::new(test_clock()),
//!     AdmissionConfig::default(),
//! );
//!
//! let draft = fixtures::draft(&test_clock(), 2, chrono::Duration::days(7));
//! let event = engine.catalog.create_event(draft).await?;
//! let booking = engine
//!     .lifecycle
//!     .create_booking(&UserId::new("alice"), event.id, 2)
//!     .await?;
//! assert_eq!(booking.seats, 2);
//! # Ok(())
//! # }
//! ```

use eventease_core::environment::Clock;
use eventease_core::store::{BookingStore, EventStore};
use std::sync::Arc;

pub mod admission;
pub mod audit;
pub mod catalog;
pub mod lifecycle;
pub mod metrics;
pub mod retry;

pub use admission::{AdmissionConfig, AdmissionController, EventSection};
pub use audit::{BookingObserver, NoopObserver, TracingObserver};
pub use catalog::EventCatalog;
pub use lifecycle::{BookingLifecycle, BookingView};

/// Lifecycle manager and catalog sharing one admission controller.
///
/// Both must share the controller: catalog edits and bookings for the same
/// event are serialized by the same section.
#[derive(Debug, Clone)]
pub struct BookingEngine {
    /// Booking create/cancel and read views
    pub lifecycle: BookingLifecycle,
    /// Organizer operations on events
    pub catalog: EventCatalog,
}

impl BookingEngine {
    /// Wire the engine over the given stores.
    #[must_use]
    pub fn new(
        events: Arc<dyn EventStore>,
        bookings: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
        config: AdmissionConfig,
    ) -> Self {
        let admission = AdmissionController::with_config(events, clock, config);
        Self {
            lifecycle: BookingLifecycle::new(admission.clone(), Arc::clone(&bookings)),
            catalog: EventCatalog::new(admission, bookings),
        }
    }

    /// Replace the lifecycle observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BookingObserver>) -> Self {
        self.lifecycle = self.lifecycle.with_observer(observer);
        self
    }
}
