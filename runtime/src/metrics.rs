//! Prometheus metrics for the booking engine.
//!
//! Covers:
//! - Seat admissions, rejections (labelled by reason) and releases
//! - Compensating releases after failed booking writes
//! - Time spent waiting for per-event critical sections
//! - Store retries
//!
//! The recorder is installed once per process by [`MetricsServer::start`]; the
//! HTTP layer serves [`MetricsServer::render`] at `GET /metrics`.
//!
//! # Example
//!
//! ```rust
//! use eventease_runtime::metrics::MetricsServer;
//!
//! let mut server = MetricsServer::new();
//! server.start()?;
//! # Ok::<(), eventease_runtime::metrics::MetricsError>(())
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the handle used to render the scrape output.
#[derive(Default)]
pub struct MetricsServer {
    handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsServer")
            .field("installed", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

impl MetricsServer {
    /// Create an uninstalled metrics server.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe all metrics and install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// A recorder can only be installed once per process. If one is already
    /// installed (e.g., by an earlier test), this logs a warning, keeps no
    /// handle, and succeeds.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Admission
    describe_counter!(
        "booking_admissions_total",
        "Seat reservations admitted by the admission controller"
    );
    describe_counter!(
        "booking_seats_reserved_total",
        "Seats reserved by admitted reservations"
    );
    describe_counter!(
        "booking_rejections_total",
        "Booking operations rejected, labelled by reason"
    );
    describe_counter!(
        "booking_releases_total",
        "Seat releases applied by the admission controller"
    );
    describe_counter!(
        "booking_compensations_total",
        "Reservations rolled back after a failed booking write"
    );
    describe_counter!(
        "booking_compensation_failures_total",
        "Compensating releases that themselves failed"
    );
    describe_histogram!(
        "event_lock_wait_duration_seconds",
        "Time spent waiting to enter a per-event critical section"
    );

    // Lifecycle
    describe_counter!("bookings_created_total", "Bookings confirmed");
    describe_counter!("bookings_cancelled_total", "Bookings cancelled");

    // Store retries
    describe_counter!(
        "store_retry_attempts_total",
        "Store operations retried after a transient failure"
    );
    describe_counter!(
        "store_retry_successes_total",
        "Store operations that succeeded after at least one retry"
    );
    describe_counter!(
        "store_retry_exhausted_total",
        "Store operations that failed after exhausting retries"
    );
    describe_histogram!(
        "store_operation_duration_seconds",
        "Latency of PostgreSQL store operations, labelled by op"
    );
}

/// Admission and lifecycle metrics recorder.
pub struct BookingMetrics;

impl BookingMetrics {
    /// Record an admitted reservation.
    pub fn record_admission(seats: u32) {
        counter!("booking_admissions_total").increment(1);
        counter!("booking_seats_reserved_total").increment(u64::from(seats));
    }

    /// Record a rejection with its stable reason code.
    pub fn record_rejection(reason: &'static str) {
        counter!("booking_rejections_total", "reason" => reason).increment(1);
    }

    /// Record a release.
    pub fn record_release() {
        counter!("booking_releases_total").increment(1);
    }

    /// Record a compensating release and whether it succeeded.
    pub fn record_compensation(succeeded: bool) {
        counter!("booking_compensations_total").increment(1);
        if !succeeded {
            counter!("booking_compensation_failures_total").increment(1);
        }
    }

    /// Record how long a caller waited for a per-event section.
    pub fn record_lock_wait(waited: Duration) {
        histogram!("event_lock_wait_duration_seconds").record(waited.as_secs_f64());
    }

    /// Record a confirmed booking.
    pub fn record_created() {
        counter!("bookings_created_total").increment(1);
    }

    /// Record a cancelled booking.
    pub fn record_cancelled() {
        counter!("bookings_cancelled_total").increment(1);
    }
}

/// Store retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt.
    pub fn record_attempt() {
        counter!("store_retry_attempts_total").increment(1);
    }

    /// Record a success after retrying.
    pub fn record_success() {
        counter!("store_retry_successes_total").increment(1);
    }

    /// Record exhausted retries.
    pub fn record_exhausted() {
        counter!("store_retry_exhausted_total").increment(1);
    }
}
