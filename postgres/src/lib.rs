//! `PostgreSQL` stores for the EventEase booking engine.
//!
//! This crate implements the `EventStore` and `BookingStore` traits from
//! `eventease-core` with sqlx:
//!
//! - Atomic single-row upserts for events and bookings
//! - A partial unique index backing "one confirmed booking per user and event"
//! - Embedded migrations (`migrations/`)
//! - Explicit pool teardown via [`PostgresStorage::close`]
//!
//! # Example
//!
//! ```no_run
//! use eventease_postgres::{PoolConfig, PostgresStorage};
//!
//! # async fn example() -> Result<(), eventease_postgres::PostgresError> {
//! let storage = PostgresStorage::connect("postgres://localhost/eventease", &PoolConfig::default()).await?;
//! storage.migrate().await?;
//!
//! let events = storage.event_store();
//! let bookings = storage.booking_store();
//! # let _ = (events, bookings);
//! storage.close().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod booking_store;
mod error;
mod event_store;

pub use booking_store::PostgresBookingStore;
pub use error::PostgresError;
pub use event_store::PostgresEventStore;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum pool size
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// Bound on acquiring a connection
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Process-wide database handle.
///
/// Created once at startup and closed once at shutdown; the stores it hands
/// out share its pool.
#[derive(Clone, Debug)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Open a connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Connect`] if the database is unreachable.
    pub async fn connect(database_url: &str, config: &PoolConfig) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(database_url)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            "PostgreSQL pool connected"
        );
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create or update the schema.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Migrate`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), PostgresError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Round-trip a trivial query.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the database does not answer.
    pub async fn ping(&self) -> Result<(), PostgresError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Event store sharing this pool.
    #[must_use]
    pub fn event_store(&self) -> PostgresEventStore {
        PostgresEventStore::new(self.pool.clone())
    }

    /// Booking store sharing this pool.
    #[must_use]
    pub fn booking_store(&self) -> PostgresBookingStore {
        PostgresBookingStore::new(self.pool.clone())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }
}
