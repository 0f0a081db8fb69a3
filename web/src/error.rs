//! Error types for web handlers.
//!
//! [`AppError`] bridges booking rejections and HTTP responses. Every error is
//! rendered as a JSON body `{ "code": ..., "message": ... }`; the code is the
//! stable machine code from [`BookingError::reason`] where one exists.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use eventease_core::BookingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Suggested back-off for clients that hit a busy event.
pub const BUSY_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Application error type for web handlers.
///
/// # Examples
///
/// ```
/// use eventease_web::AppError;
/// use eventease_core::BookingError;
///
/// let err = AppError::from(BookingError::AlreadyBooked);
/// assert_eq!(err.code(), "ALREADY_BOOKED");
/// assert_eq!(err.status().as_u16(), 400);
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Value for the `Retry-After` header
    retry_after: Option<Duration>,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.into(),
            retry_after: None,
            source: None,
        }
    }

    /// Attach an internal source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Ask the client to retry after `delay`.
    #[must_use]
    pub const fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
    }

    /// Create a 403 Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message, "FORBIDDEN")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Error code (for client error handling).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                ),
            }
        }

        let body = ErrorBody {
            code: self.code,
            message: self.message,
        };
        let mut response = (self.status, Json(body)).into_response();

        if let Some(delay) = self.retry_after {
            let seconds = delay.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Map booking rejections to client-facing statuses.
impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let code = err.reason();
        let status = match &err {
            BookingError::EventNotFound(_) | BookingError::BookingNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            BookingError::EventPassed
            | BookingError::InvalidSeatCount(_)
            | BookingError::CapacityExceeded { .. }
            | BookingError::AlreadyBooked
            | BookingError::AlreadyCancelled
            | BookingError::EventAlreadyStarted
            | BookingError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
            BookingError::EventHasActiveBookings { .. } => StatusCode::CONFLICT,
            BookingError::NotAuthorized => StatusCode::FORBIDDEN,
            BookingError::Busy { .. } => {
                return Self::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string(), code)
                    .with_retry_after(BUSY_RETRY_AFTER);
            }
            BookingError::Storage(_) => {
                return Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A storage error occurred",
                    code,
                )
                .with_source(anyhow::Error::new(err));
            }
            BookingError::Interrupted(_) => {
                return Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The request could not be completed",
                    code,
                )
                .with_source(anyhow::Error::new(err));
            }
        };
        Self::new(status, err.to_string(), code)
    }
}

/// Malformed JSON bodies keep the framework's explanation.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text(), "INVALID_BODY")
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text(), "INVALID_PATH")
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text(), "INVALID_QUERY")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventease_core::{BookingId, EventId, StoreError};

    #[test]
    fn test_error_display() {
        let err = AppError::forbidden("Admin role required");
        assert_eq!(err.to_string(), "[FORBIDDEN] Admin role required");
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn rejection_statuses() {
        let cases = [
            (BookingError::EventNotFound(EventId::new()), StatusCode::NOT_FOUND),
            (BookingError::BookingNotFound(BookingId::new()), StatusCode::NOT_FOUND),
            (BookingError::EventPassed, StatusCode::BAD_REQUEST),
            (BookingError::InvalidSeatCount(3), StatusCode::BAD_REQUEST),
            (
                BookingError::CapacityExceeded {
                    requested: 2,
                    available: 1,
                },
                StatusCode::BAD_REQUEST,
            ),
            (BookingError::AlreadyBooked, StatusCode::BAD_REQUEST),
            (BookingError::AlreadyCancelled, StatusCode::BAD_REQUEST),
            (BookingError::EventAlreadyStarted, StatusCode::BAD_REQUEST),
            (BookingError::NotAuthorized, StatusCode::FORBIDDEN),
            (
                BookingError::EventHasActiveBookings { active: 2 },
                StatusCode::CONFLICT,
            ),
            (
                BookingError::Busy {
                    waited: Duration::from_secs(2),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                BookingError::Storage(StoreError::transient("down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                BookingError::Interrupted("task panicked".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            let code = error.reason();
            let app = AppError::from(error);
            assert_eq!(app.status(), status, "{code}");
            assert_eq!(app.code(), code);
        }
    }

    #[test]
    fn busy_sets_retry_after() {
        let response = AppError::from(BookingError::Busy {
            waited: Duration::from_millis(2000),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("1")
        );
    }

    #[test]
    fn storage_failures_hide_details() {
        let app = AppError::from(BookingError::Storage(StoreError::permanent(
            "relation \"events\" does not exist",
        )));
        assert_eq!(app.message(), "A storage error occurred");
        assert!(std::error::Error::source(&app).is_some());
    }
}
