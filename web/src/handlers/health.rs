//! Health check endpoints.
//!
//! `GET /health` is pure liveness. `GET /ready` asks a [`Readiness`]
//! (typically the storage backend) whether requests can be served.

use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the service is running.
/// This endpoint does NOT check dependencies (database, etc.).
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Coarse health of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Fully operational
    Healthy,
    /// Serving, with reduced guarantees
    Degraded,
    /// Not able to serve
    Unhealthy,
}

/// Readiness report for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Component name, e.g. `storage`
    pub component: String,
    /// Component status
    pub status: HealthStatus,
    /// Human-readable detail
    pub message: String,
}

impl HealthCheck {
    /// A healthy report.
    #[must_use]
    pub fn healthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            message: message.into(),
        }
    }

    /// An unhealthy report.
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Unhealthy,
            message: message.into(),
        }
    }
}

/// Something that can report whether the service is ready.
pub trait Readiness: Send + Sync {
    /// Check the component.
    fn check(&self) -> Pin<Box<dyn Future<Output = HealthCheck> + Send + '_>>;
}

/// Readiness response for `GET /ready`.
///
/// # Status Codes
///
/// - 200 OK: Healthy or Degraded
/// - 503 Service Unavailable: Unhealthy
pub async fn readiness_check(readiness: &dyn Readiness) -> (StatusCode, Json<HealthCheck>) {
    let health = readiness.check().await;

    let status = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(health))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(HealthCheck);

    impl Readiness for Fixed {
        fn check(&self) -> Pin<Box<dyn Future<Output = HealthCheck> + Send + '_>> {
            let report = self.0.clone();
            Box::pin(async move { report })
        }
    }

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_ready_when_healthy() {
        let readiness = Fixed(HealthCheck::healthy("storage", "memory"));
        let (status, Json(health)) = readiness_check(&readiness).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_not_ready_when_unhealthy() {
        let readiness = Fixed(HealthCheck::unhealthy("storage", "connection refused"));
        let (status, Json(health)) = readiness_check(&readiness).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(health.component, "storage");
    }
}
