//! Retry with exponential backoff for transient store failures.
//!
//! The admission controller and lifecycle manager never retry: business-rule
//! rejections are final. Transient persistence faults (pool timeouts, dropped
//! connections) are retried here, below the core, by wrapping a store in
//! [`Retrying`].
//!
//! # Example
//!
//! ```rust
//! use eventease_runtime::retry::{RetryPolicy, Retrying};
//! use eventease_testing::InMemoryEventStore;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_retries(5)
//!     .initial_delay(Duration::from_millis(20))
//!     .max_delay(Duration::from_secs(1))
//!     .build();
//!
//! let events = Retrying::new(InMemoryEventStore::new(), policy);
//! ```

use crate::metrics::RetryMetrics;
use eventease_core::store::{BookingStore, EventStore, StoreFuture};
use eventease_core::{
    Booking, BookingId, BookingStatus, DateTime, Event, EventId, StoreError, UserId, Utc,
};
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration for exponential backoff.
///
/// # Default Values
///
/// - `max_retries`: 3
/// - `initial_delay`: 50ms
/// - `max_delay`: 2 seconds
/// - `multiplier`: 2.0 (delay doubles each retry)
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: usize,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries (cap for exponential backoff)
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_retries: None,
            initial_delay: None,
            max_delay: None,
            multiplier: None,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::builder().max_retries(0).build()
    }

    /// Delay before retry number `attempt` (zero-based).
    ///
    /// `initial_delay * multiplier^attempt`, capped at `max_delay`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);

        if !delay_ms.is_finite() || delay_ms >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }

        Duration::from_millis(delay_ms as u64)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_retries: Option<usize>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
}

impl RetryPolicyBuilder {
    /// Set maximum number of retries.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set initial delay before first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set maximum delay (cap for exponential backoff).
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set multiplier for exponential backoff.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries.unwrap_or(3),
            initial_delay: self.initial_delay.unwrap_or(Duration::from_millis(50)),
            max_delay: self.max_delay.unwrap_or(Duration::from_secs(2)),
            multiplier: self.multiplier.unwrap_or(2.0),
        }
    }
}

/// Retry an async operation while `is_retryable` accepts its error.
///
/// Non-retryable errors are returned immediately. Once `max_retries` retries
/// have failed, the last error is returned.
///
/// # Errors
///
/// The operation's error, see above.
///
/// # Example
///
/// ```rust
/// use eventease_runtime::retry::{RetryPolicy, retry_with_predicate};
///
/// # async fn example() -> Result<(), String> {
/// let value = retry_with_predicate(
///     RetryPolicy::default(),
///     || async { Ok::<_, String>(42) },
///     |err: &String| err.contains("transient"),
/// )
/// .await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    RetryMetrics::record_success();
                    tracing::info!(attempt, "Store operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(err);
                }

                if attempt >= policy.max_retries {
                    if policy.max_retries > 0 {
                        RetryMetrics::record_exhausted();
                    }
                    tracing::error!(attempt, error = %err, "Store operation failed after max retries");
                    return Err(err);
                }

                let delay = policy.delay_for_attempt(attempt);
                RetryMetrics::record_attempt();
                tracing::warn!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Transient store failure, retrying"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Store decorator that retries transient [`StoreError`]s.
///
/// Implements both [`EventStore`] and [`BookingStore`] when the wrapped store
/// does. Conflicts and permanent errors pass through untouched.
#[derive(Debug, Clone)]
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Retrying<S> {
    /// Wrap `inner` with `policy`.
    #[must_use]
    pub const fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// The retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<S: EventStore> EventStore for Retrying<S> {
    fn get_event(&self, id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(retry_with_predicate(
            self.policy.clone(),
            move || self.inner.get_event(id),
            StoreError::is_transient,
        ))
    }

    fn put_event(&self, event: Event) -> StoreFuture<'_, ()> {
        Box::pin(retry_with_predicate(
            self.policy.clone(),
            move || self.inner.put_event(event.clone()),
            StoreError::is_transient,
        ))
    }

    fn update_occupancy(
        &self,
        id: EventId,
        expected: u32,
        occupancy: u32,
        updated_at: DateTime<Utc>,
    ) -> StoreFuture<'_, ()> {
        Box::pin(retry_with_predicate(
            self.policy.clone(),
            move || self.inner.update_occupancy(id, expected, occupancy, updated_at),
            StoreError::is_transient,
        ))
    }

    fn list_events(&self) -> StoreFuture<'_, Vec<Event>> {
        Box::pin(retry_with_predicate(
            self.policy.clone(),
            move || self.inner.list_events(),
            StoreError::is_transient,
        ))
    }

    fn delete_event(&self, id: EventId) -> StoreFuture<'_, bool> {
        Box::pin(retry_with_predicate(
            self.policy.clone(),
            move || self.inner.delete_event(id),
            StoreError::is_transient,
        ))
    }
}

impl<S: BookingStore> BookingStore for Retrying<S> {
    fn get_booking(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(retry_with_predicate(
            self.policy.clone(),
            move || self.inner.get_booking(id),
            StoreError::is_transient,
        ))
    }

    fn get_active_booking(
        &self,
        user_id: &UserId,
        event_id: EventId,
    ) -> StoreFuture<'_, Option<Booking>> {
        let user_id = user_id.clone();
        Box::pin(retry_with_predicate(
            self.policy.clone(),
            move || self.inner.get_active_booking(&user_id, event_id),
            StoreError::is_transient,
        ))
    }

    fn put_booking(&self, booking: Booking) -> StoreFuture<'_, ()> {
        Box::pin(retry_with_predicate(
            self.policy.clone(),
            move || self.inner.put_booking(booking.clone()),
            StoreError::is_transient,
        ))
    }

    fn list_user_bookings(
        &self,
        user_id: &UserId,
        status: Option<BookingStatus>,
    ) -> StoreFuture<'_, Vec<Booking>> {
        let user_id = user_id.clone();
        Box::pin(retry_with_predicate(
            self.policy.clone(),
            move || self.inner.list_user_bookings(&user_id, status),
            StoreError::is_transient,
        ))
    }

    fn list_event_bookings(
        &self,
        event_id: EventId,
        status: Option<BookingStatus>,
    ) -> StoreFuture<'_, Vec<Booking>> {
        Box::pin(retry_with_predicate(
            self.policy.clone(),
            move || self.inner.list_event_bookings(event_id, status),
            StoreError::is_transient,
        ))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use eventease_testing::fixtures::EventBuilder;
    use eventease_testing::{InMemoryBookingStore, InMemoryEventStore, StoreOp, test_clock};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
            .build()
    }

    #[test]
    fn test_retry_policy_delay_calculation() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(100))
            .multiplier(2.0)
            .max_delay(Duration::from_secs(10))
            .build();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn test_retry_policy_max_delay_cap() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(1000))
            .multiplier(10.0)
            .max_delay(Duration::from_secs(2))
            .build();

        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(10_000), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_retry_with_predicate_skips_non_retryable() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        let result = retry_with_predicate(
            fast_policy(3),
            || {
                let c = Arc::clone(&counter_clone);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>("permanent error")
                }
            },
            |err: &&str| err.contains("transient"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhausts_retries() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        let result = retry_with_predicate(
            fast_policy(2),
            || {
                let c = Arc::clone(&counter_clone);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>("transient failure")
                }
            },
            |err: &&str| err.contains("transient"),
        )
        .await;

        assert_eq!(result, Err("transient failure"));
        assert_eq!(counter.load(Ordering::SeqCst), 3); // Initial + 2 retries
    }

    #[tokio::test]
    async fn retrying_store_recovers_from_transient_faults() {
        let inner = InMemoryEventStore::new();
        inner.fail_next(StoreOp::Put, StoreError::transient("pool timed out"));
        inner.fail_next(StoreOp::Put, StoreError::transient("connection reset"));

        let store = Retrying::new(inner.clone(), fast_policy(3));
        let event = EventBuilder::new(test_clock()).build();

        store.put_event(event.clone()).await.unwrap();
        assert_eq!(inner.calls(StoreOp::Put), 3);
        assert_eq!(inner.snapshot(event.id), Some(event));
    }

    #[tokio::test]
    async fn retrying_store_passes_permanent_errors_through() {
        let inner = InMemoryBookingStore::new();
        inner.fail_next(StoreOp::List, StoreError::permanent("syntax error"));

        let store = Retrying::new(inner.clone(), fast_policy(3));
        let result = store
            .list_user_bookings(&UserId::new("u-1"), None)
            .await;

        assert_eq!(result, Err(StoreError::permanent("syntax error")));
        assert_eq!(inner.calls(StoreOp::List), 1);
    }

    #[tokio::test]
    async fn retrying_store_gives_up_after_max_retries() {
        let inner = InMemoryEventStore::new();
        for _ in 0..5 {
            inner.fail_next(StoreOp::Get, StoreError::transient("down"));
        }

        let store = Retrying::new(inner.clone(), fast_policy(2));
        let result = store.get_event(EventId::new()).await;

        assert_eq!(result, Err(StoreError::transient("down")));
        assert_eq!(inner.calls(StoreOp::Get), 3);
    }
}
