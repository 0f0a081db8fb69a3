//! HTTP handlers shared by every EventEase deployment.

pub mod health;
pub mod metrics;

pub use health::{HealthCheck, HealthStatus, Readiness, health_check, readiness_check};
pub use metrics::metrics_response;
