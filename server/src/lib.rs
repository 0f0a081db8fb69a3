//! # EventEase Server
//!
//! HTTP front end for the EventEase booking engine.
//!
//! - [`config`]: environment-driven configuration
//! - [`storage`]: in-memory or `PostgreSQL` backend, initialised once
//! - [`api`]: event catalog and booking endpoints
//! - [`server`]: shared state and router
//! - [`app`]: startup and graceful shutdown
//!
//! Caller identity is asserted by the gateway through `X-User-Id` and
//! `X-User-Role`; catalog writes require the `admin` role.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod app;
pub mod config;
pub mod server;
pub mod storage;

pub use app::Application;
pub use config::Config;
pub use server::{AppState, build_router};
pub use storage::Storage;
