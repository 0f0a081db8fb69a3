//! Axum integration for the EventEase booking engine.
//!
//! The booking engine (`eventease-runtime`) knows nothing about HTTP. This
//! crate is the thin shell that turns its outcomes into responses:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← headers, JSON, status codes
//! │  - Caller identity extraction           │  ← correlation IDs, tracing
//! │  - BookingError → HTTP mapping          │  ← Retry-After on Busy
//! ├─────────────────────────────────────────┤
//! │         Booking engine                  │
//! │  - Per-event admission                  │  ← no overbooking
//! │  - Lifecycle + compensation             │  ← typed rejections
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use eventease_web::{AppError, Caller, WebResult};
//!
//! async fn cancel(
//!     State(state): State<AppState>,
//!     caller: Caller,
//!     Path(id): Path<BookingId>,
//! ) -> WebResult<Json<BookingResponse>> {
//!     let booking = state.engine.lifecycle.cancel_booking(&caller.user_id, id).await?;
//!     Ok(Json(booking.into()))
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::{AppError, ErrorBody};
pub use extractors::{AdminCaller, Caller, CorrelationId, USER_ID_HEADER, USER_ROLE_HEADER};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationIdExt, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
