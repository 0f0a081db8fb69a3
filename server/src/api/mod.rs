//! REST endpoints.

pub mod bookings;
pub mod events;
