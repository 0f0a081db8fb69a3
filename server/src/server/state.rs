//! Application state shared by every handler.

use crate::config::BookingConfig;
use crate::storage::Storage;
use eventease_core::environment::Clock;
use eventease_runtime::BookingEngine;
use eventease_runtime::metrics::MetricsServer;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Booking lifecycle and event catalog
    pub engine: BookingEngine,
    /// Backend the engine's stores live in, checked by `/ready`
    pub storage: Arc<Storage>,
    /// Prometheus handle rendered by `/metrics`
    pub metrics: Arc<MetricsServer>,
}

impl AppState {
    /// Wire the engine over `storage`.
    #[must_use]
    pub fn new(
        storage: Arc<Storage>,
        clock: Arc<dyn Clock>,
        booking: &BookingConfig,
        metrics: Arc<MetricsServer>,
    ) -> Self {
        let (events, bookings) = storage.stores(&booking.retry_policy());
        let engine = BookingEngine::new(events, bookings, clock, booking.admission());
        Self {
            engine,
            storage,
            metrics,
        }
    }
}
