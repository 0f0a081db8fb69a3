//! Storage backend selection and teardown.
//!
//! Storage is initialised once in [`Storage::connect`] and torn down once in
//! [`Storage::shutdown`]; handlers only ever see the trait objects it hands out.

use crate::config::{StorageBackend, StorageConfig};
use eventease_core::store::{BookingStore, EventStore};
use eventease_postgres::{PostgresError, PostgresStorage};
use eventease_runtime::retry::{RetryPolicy, Retrying};
use eventease_testing::{InMemoryBookingStore, InMemoryEventStore};
use eventease_web::handlers::{HealthCheck, Readiness};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The process-wide storage backend.
#[derive(Debug, Clone)]
pub enum Storage {
    /// In-process maps
    Memory {
        /// Event records
        events: InMemoryEventStore,
        /// Booking records
        bookings: InMemoryBookingStore,
    },
    /// `PostgreSQL` pool
    Postgres(PostgresStorage),
}

impl Storage {
    /// Empty in-memory storage.
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory {
            events: InMemoryEventStore::new(),
            bookings: InMemoryBookingStore::new(),
        }
    }

    /// Initialise the configured backend, running migrations for `PostgreSQL`.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError`] if the database is unreachable or a migration fails.
    pub async fn connect(config: &StorageConfig) -> Result<Self, PostgresError> {
        match config.backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Ok(Self::memory())
            }
            StorageBackend::Postgres => {
                let storage =
                    PostgresStorage::connect(&config.database_url, &config.pool_config()).await?;
                storage.migrate().await?;
                Ok(Self::Postgres(storage))
            }
        }
    }

    /// Backend name for logs and readiness reports.
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::Postgres(_) => "postgres",
        }
    }

    /// Store handles for the booking engine.
    ///
    /// `PostgreSQL` stores are wrapped in [`Retrying`] so transient failures
    /// are retried under `retry`; in-memory stores never fail transiently.
    #[must_use]
    pub fn stores(&self, retry: &RetryPolicy) -> (Arc<dyn EventStore>, Arc<dyn BookingStore>) {
        match self {
            Self::Memory { events, bookings } => (Arc::new(events.clone()), Arc::new(bookings.clone())),
            Self::Postgres(storage) => (
                Arc::new(Retrying::new(storage.event_store(), retry.clone())),
                Arc::new(Retrying::new(storage.booking_store(), retry.clone())),
            ),
        }
    }

    /// Release backend resources.
    pub async fn shutdown(&self) {
        match self {
            Self::Memory { .. } => tracing::info!("In-memory storage dropped"),
            Self::Postgres(storage) => storage.close().await,
        }
    }
}

impl Readiness for Storage {
    fn check(&self) -> Pin<Box<dyn Future<Output = HealthCheck> + Send + '_>> {
        Box::pin(async move {
            match self {
                Self::Memory { .. } => HealthCheck::healthy("storage", "in-memory storage"),
                Self::Postgres(storage) => match storage.ping().await {
                    Ok(()) => HealthCheck::healthy("storage", "postgres reachable"),
                    Err(e) => {
                        tracing::warn!(error = %e, "Readiness ping failed");
                        HealthCheck::unhealthy("storage", "postgres unreachable")
                    }
                },
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use eventease_testing::fixtures::EventBuilder;
    use eventease_testing::test_clock;
    use eventease_web::handlers::HealthStatus;

    #[tokio::test]
    async fn memory_storage_is_ready() {
        let storage = Storage::memory();

        assert_eq!(storage.backend_name(), "memory");
        assert_eq!(storage.check().await.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn memory_stores_share_state() {
        let storage = Storage::memory();
        let (events, _) = storage.stores(&RetryPolicy::none());
        let (again, _) = storage.stores(&RetryPolicy::none());

        let event = EventBuilder::new(test_clock()).build();
        events.put_event(event).await.unwrap();

        assert_eq!(again.list_events().await.unwrap().len(), 1);
    }
}
