//! Translation of `sqlx` failures into [`StoreError`].

use eventease_core::StoreError;
use thiserror::Error;

/// Errors raised while setting up the database.
#[derive(Error, Debug)]
pub enum PostgresError {
    /// Could not open the connection pool
    #[error("Failed to connect to PostgreSQL: {0}")]
    Connect(#[from] sqlx::Error),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// `PostgreSQL` SQLSTATE codes worth retrying.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Map an `sqlx` error from operation `op` to a [`StoreError`].
///
/// Unique violations become `Conflict`; pool exhaustion, I/O failures,
/// serialization failures and deadlocks are transient.
pub(crate) fn map_sqlx_error(op: &str, error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::Database(db) => {
            if db.is_unique_violation() {
                return StoreError::Conflict(format!("{op}: {}", db.message()));
            }
            let retryable = db
                .code()
                .is_some_and(|code| code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED);
            StoreError::Database {
                message: format!("{op}: {}", db.message()),
                transient: retryable,
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => {
            StoreError::transient(format!("{op}: {error}"))
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(op.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(format!("{op}: {error}"))
        }
        _ => StoreError::permanent(format!("{op}: {error}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_transient() {
        assert!(map_sqlx_error("get_event", sqlx::Error::PoolTimedOut).is_transient());
    }

    #[test]
    fn pool_closed_is_permanent() {
        let mapped = map_sqlx_error("get_event", sqlx::Error::PoolClosed);
        assert!(!mapped.is_transient());
        assert!(matches!(mapped, StoreError::Database { .. }));
    }

    #[test]
    fn missing_row_is_not_found() {
        assert!(matches!(
            map_sqlx_error("get_booking", sqlx::Error::RowNotFound),
            StoreError::NotFound(_)
        ));
    }
}
