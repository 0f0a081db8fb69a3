//! # EventEase Core
//!
//! Domain types, admission rules and storage traits for the EventEase booking engine.
//!
//! Organizers publish events with a finite number of seats; users reserve one or two
//! seats per event and may cancel to give them back. This crate holds the parts of
//! that engine that need no I/O:
//!
//! - [`types`]: events, bookings and their identifiers
//! - [`admission`]: pure decisions for reserving and releasing seats
//! - [`error`]: the rejection taxonomy shared by every layer
//! - [`store`]: dyn-compatible persistence traits
//! - [`environment`]: injected dependencies such as [`environment::Clock`]
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell: decisions here, locking and I/O in `eventease-runtime`
//! - Explicit rejections: every business-rule violation is a typed [`BookingError`]
//! - Derived views are computed, never stored

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admission;
pub mod environment;
pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use error::{BookingError, StoreError};
pub use store::{BookingStore, EventStore, StoreFuture};
pub use types::{
    Booking, BookingId, BookingStatus, BusinessId, Event, EventDraft, EventId, EventPatch,
    EventStatus, Role, UserId, MAX_SEATS_PER_BOOKING, MIN_SEATS_PER_BOOKING,
};
