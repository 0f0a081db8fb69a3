//! Custom Axum extractors.
//!
//! - [`CorrelationId`]: the request's correlation ID
//! - [`Caller`]: the authenticated caller as asserted by the user directory
//! - [`AdminCaller`]: a caller that must hold the admin role
//!
//! Identity arrives in the `X-User-Id` and `X-User-Role` headers, set by the
//! gateway in front of this service. They are trusted as-is.
//!
//! # Examples
//!
//! ```ignore
//! use eventease_web::extractors::{Caller, CorrelationId};
//!
//! async fn my_bookings(caller: Caller, correlation_id: CorrelationId) -> String {
//!     tracing::info!(correlation_id = %correlation_id.0, user_id = %caller.user_id, "Listing bookings");
//!     caller.user_id.to_string()
//! }
//! ```

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use eventease_core::{Role, UserId};
use uuid::Uuid;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Header carrying the caller's role (`user` or `admin`).
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Correlation ID for request tracing.
///
/// Uses the ID stored by the correlation middleware when installed, then the
/// `X-Correlation-ID` header, and finally a fresh UUID v4.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Uuid>() {
            return Ok(Self(*id));
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// The caller on whose behalf a request runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Directory-issued user id
    pub user_id: UserId,
    /// Directory-issued role; `user` when the header is absent
    pub role: Role,
}

impl Caller {
    /// Whether the caller may manage the event catalog.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::unauthorized(format!("Missing {USER_ID_HEADER} header")))?;

        let role = match parts.headers.get(USER_ROLE_HEADER) {
            None => Role::User,
            Some(value) => value
                .to_str()
                .ok()
                .and_then(Role::parse)
                .ok_or_else(|| AppError::unauthorized(format!("Unrecognized {USER_ROLE_HEADER}")))?,
        };

        Ok(Self {
            user_id: UserId::new(user_id),
            role,
        })
    }
}

/// A caller holding the admin role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCaller(pub Caller);

#[async_trait]
impl<S> FromRequestParts<S> for AdminCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        if caller.is_admin() {
            Ok(Self(caller))
        } else {
            Err(AppError::forbidden("Admin role required"))
        }
    }
}
