//! Capacity admission controller.
//!
//! The controller is the only component that changes an event's occupancy.
//! Every reserve or release runs inside a critical section keyed by event id:
//! operations on the same event are serialized, operations on different events
//! never contend on a shared lock.
//!
//! ```text
//! enter(event_id) ──► wait ≤ lock_timeout ──► EventSection
//!                          │                     ├─ reserve(seats)  read → decide → compare-and-set
//!                          ▼                     ├─ release(seats)  read → decide → compare-and-set
//!                        Busy                    └─ save / remove   (catalog edits)
//! ```
//!
//! The section is an owned guard. Callers that must perform several writes as
//! one unit (the lifecycle manager's booking write and its compensating release)
//! hold the section across all of them.
//!
//! Sections serialize callers within one process. Occupancy writes are also
//! conditional on the value read, so processes sharing a database never lose
//! each other's updates: a stale write is rejected and the decision retaken.

use crate::metrics::BookingMetrics;
use eventease_core::admission::{decide_release, decide_reservation};
use eventease_core::environment::Clock;
use eventease_core::store::EventStore;
use eventease_core::{BookingError, DateTime, Event, EventId, StoreError, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::OwnedMutexGuard;

/// Default bound on waiting for a per-event section.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Conditional occupancy writes attempted before a section gives up with `Busy`.
pub const MAX_OCCUPANCY_ATTEMPTS: usize = 5;

/// Admission controller configuration.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Longest a caller waits for an event's section before getting `Busy`
    pub lock_timeout: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// Registry of per-event locks.
///
/// Entries are created on demand and pruned as soon as no section holds or
/// awaits them, so the map only ever contains events with traffic in flight.
#[derive(Debug, Default)]
struct EventLocks {
    sections: Mutex<HashMap<EventId, Arc<tokio::sync::Mutex<()>>>>,
}

impl EventLocks {
    fn lock_for(&self, event_id: EventId) -> Arc<tokio::sync::Mutex<()>> {
        let mut sections = self.sections.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sections.entry(event_id).or_default())
    }

    /// Drop the entry for `event_id` if the registry holds the only reference.
    fn prune(&self, event_id: EventId) {
        let mut sections = self.sections.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = sections
            .get(&event_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            sections.remove(&event_id);
        }
    }

    fn len(&self) -> usize {
        self.sections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Serializes occupancy changes per event.
///
/// Cheap to clone; clones share the same lock registry.
#[derive(Clone)]
pub struct AdmissionController {
    events: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    locks: Arc<EventLocks>,
    config: AdmissionConfig,
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("config", &self.config)
            .field("active_sections", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl AdmissionController {
    /// Create a controller with the default configuration.
    #[must_use]
    pub fn new(events: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(events, clock, AdmissionConfig::default())
    }

    /// Create a controller with an explicit configuration.
    #[must_use]
    pub fn with_config(
        events: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            events,
            clock,
            locks: Arc::new(EventLocks::default()),
            config,
        }
    }

    /// The event store this controller writes occupancy to.
    #[must_use]
    pub fn events(&self) -> &Arc<dyn EventStore> {
        &self.events
    }

    /// Current time according to the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Configured section wait bound.
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        self.config.lock_timeout
    }

    /// Number of events with a section currently held or awaited.
    #[must_use]
    pub fn active_sections(&self) -> usize {
        self.locks.len()
    }

    /// Enter the critical section for `event_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Busy`] if the section could not be entered
    /// within the configured `lock_timeout`.
    #[tracing::instrument(skip(self), fields(event_id = %event_id))]
    pub async fn enter(&self, event_id: EventId) -> Result<EventSection, BookingError> {
        let lock = self.locks.lock_for(event_id);
        let started = Instant::now();

        let acquired = tokio::time::timeout(self.config.lock_timeout, lock.lock_owned()).await;
        let waited = started.elapsed();
        BookingMetrics::record_lock_wait(waited);

        match acquired {
            Ok(guard) => Ok(EventSection {
                event_id,
                events: Arc::clone(&self.events),
                clock: Arc::clone(&self.clock),
                locks: Arc::clone(&self.locks),
                guard: Some(guard),
            }),
            Err(_) => {
                self.locks.prune(event_id);
                let error = BookingError::Busy { waited };
                BookingMetrics::record_rejection(error.reason());
                tracing::warn!(
                    waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                    "Timed out waiting for event section"
                );
                Err(error)
            }
        }
    }

    /// Reserve `seats` on `event_id` in a section of its own.
    ///
    /// # Errors
    ///
    /// `Busy`, any reservation rejection, or `Storage`.
    pub async fn reserve(&self, event_id: EventId, seats: u32) -> Result<Event, BookingError> {
        self.enter(event_id).await?.reserve(seats).await
    }

    /// Release `seats` on `event_id` in a section of its own.
    ///
    /// # Errors
    ///
    /// `Busy`, `EventNotFound`, or `Storage`.
    pub async fn release(&self, event_id: EventId, seats: u32) -> Result<Event, BookingError> {
        self.enter(event_id).await?.release(seats).await
    }
}

/// Exclusive access to one event's occupancy.
///
/// Dropping the section leaves it.
pub struct EventSection {
    event_id: EventId,
    events: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    locks: Arc<EventLocks>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl std::fmt::Debug for EventSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSection")
            .field("event_id", &self.event_id)
            .finish_non_exhaustive()
    }
}

impl EventSection {
    /// The event this section guards.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Current time according to the controller's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Read the guarded event.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the read fails.
    pub async fn load(&self) -> Result<Option<Event>, BookingError> {
        Ok(self.events.get_event(self.event_id).await?)
    }

    /// Admit a reservation of `seats` and persist the new occupancy.
    ///
    /// The precondition check and the increment happen against a read taken
    /// inside this section, so no other reserve or release on the event can
    /// interleave. The write is conditional on that read; if another process
    /// sharing the store changed the occupancy meanwhile, the decision is
    /// taken again on a fresh read.
    ///
    /// # Errors
    ///
    /// `EventNotFound`, `EventPassed`, `InvalidSeatCount`, `CapacityExceeded`
    /// (in that order), `Busy` if the occupancy kept changing underneath, or
    /// `Storage`.
    #[tracing::instrument(skip(self), fields(event_id = %self.event_id))]
    pub async fn reserve(&self, seats: u32) -> Result<Event, BookingError> {
        let started = Instant::now();
        for _ in 0..MAX_OCCUPANCY_ATTEMPTS {
            let now = self.clock.now();
            let current = self.load().await?;

            let occupancy = match decide_reservation(self.event_id, current.as_ref(), seats, now) {
                Ok(occupancy) => occupancy,
                Err(rejection) => {
                    BookingMetrics::record_rejection(rejection.reason());
                    tracing::debug!(reason = rejection.reason(), "Reservation rejected");
                    return Err(rejection);
                }
            };

            let event = current.ok_or(BookingError::EventNotFound(self.event_id))?;
            if let Some(event) = self.write_occupancy(event, occupancy, now).await? {
                BookingMetrics::record_admission(seats);
                tracing::debug!(
                    seats,
                    occupancy = event.occupancy,
                    capacity = event.capacity,
                    "Reservation admitted"
                );
                return Ok(event);
            }
        }
        Err(self.contended(started))
    }

    /// Give `seats` back to the event and persist the new occupancy.
    ///
    /// # Errors
    ///
    /// `EventNotFound` if the event vanished, `Busy` if the occupancy kept
    /// changing underneath, or `Storage`.
    #[tracing::instrument(skip(self), fields(event_id = %self.event_id))]
    pub async fn release(&self, seats: u32) -> Result<Event, BookingError> {
        let started = Instant::now();
        for _ in 0..MAX_OCCUPANCY_ATTEMPTS {
            let now = self.clock.now();
            let current = self.load().await?;

            let occupancy = decide_release(self.event_id, current.as_ref(), seats)?;

            let event = current.ok_or(BookingError::EventNotFound(self.event_id))?;
            if let Some(event) = self.write_occupancy(event, occupancy, now).await? {
                BookingMetrics::record_release();
                tracing::debug!(seats, occupancy = event.occupancy, "Seats released");
                return Ok(event);
            }
        }
        Err(self.contended(started))
    }

    /// Compare-and-set the occupancy read in `event`. `None` means the stored
    /// value moved and the caller must decide again.
    async fn write_occupancy(
        &self,
        mut event: Event,
        occupancy: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>, BookingError> {
        let expected = event.occupancy;
        match self
            .events
            .update_occupancy(self.event_id, expected, occupancy, now)
            .await
        {
            Ok(()) => {
                event.occupancy = occupancy;
                event.updated_at = now;
                Ok(Some(event))
            }
            Err(StoreError::Conflict(reason)) => {
                tracing::debug!(%reason, expected, "Occupancy changed outside this section");
                Ok(None)
            }
            Err(StoreError::NotFound(_)) => Err(BookingError::EventNotFound(self.event_id)),
            Err(other) => Err(other.into()),
        }
    }

    fn contended(&self, started: Instant) -> BookingError {
        let error = BookingError::Busy {
            waited: started.elapsed(),
        };
        BookingMetrics::record_rejection(error.reason());
        tracing::warn!(
            event_id = %self.event_id,
            attempts = MAX_OCCUPANCY_ATTEMPTS,
            "Occupancy kept changing, giving up"
        );
        error
    }

    /// Persist descriptive edits to the guarded event. The stored occupancy
    /// is kept whatever `event.occupancy` says.
    ///
    /// # Errors
    ///
    /// `InvalidEvent` if `event` is not the guarded event, or `Storage`.
    pub async fn save(&self, event: Event) -> Result<(), BookingError> {
        if event.id != self.event_id {
            return Err(BookingError::InvalidEvent(format!(
                "section for {} cannot write event {}",
                self.event_id, event.id
            )));
        }
        Ok(self.events.put_event(event).await?)
    }

    /// Delete the guarded event. Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the delete fails.
    pub async fn remove(&self) -> Result<bool, BookingError> {
        Ok(self.events.delete_event(self.event_id).await?)
    }
}

impl Drop for EventSection {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.prune(self.event_id);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use eventease_core::store::StoreFuture;
    use eventease_testing::fixtures::EventBuilder;
    use eventease_testing::{InMemoryEventStore, StoreOp, test_clock};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Event store where another process admits `seats` just before each of
    /// the first `races` occupancy writes.
    struct SharedWithAnotherProcess {
        inner: InMemoryEventStore,
        seats: u32,
        races: AtomicUsize,
    }

    impl EventStore for SharedWithAnotherProcess {
        fn get_event(&self, id: EventId) -> StoreFuture<'_, Option<Event>> {
            self.inner.get_event(id)
        }

        fn put_event(&self, event: Event) -> StoreFuture<'_, ()> {
            self.inner.put_event(event)
        }

        fn update_occupancy(
            &self,
            id: EventId,
            expected: u32,
            occupancy: u32,
            updated_at: DateTime<Utc>,
        ) -> StoreFuture<'_, ()> {
            let remaining = self.races.load(Ordering::SeqCst);
            if remaining > 0 {
                self.races.store(remaining - 1, Ordering::SeqCst);
                let stored = self.inner.snapshot(id).unwrap().occupancy;
                self.inner.set_occupancy(id, stored + self.seats);
            }
            self.inner.update_occupancy(id, expected, occupancy, updated_at)
        }

        fn list_events(&self) -> StoreFuture<'_, Vec<Event>> {
            self.inner.list_events()
        }

        fn delete_event(&self, id: EventId) -> StoreFuture<'_, bool> {
            self.inner.delete_event(id)
        }
    }

    fn controller(store: &InMemoryEventStore, lock_timeout: Duration) -> AdmissionController {
        AdmissionController::with_config(
            Arc::new(store.clone()),
            Arc::new(test_clock()),
            AdmissionConfig { lock_timeout },
        )
    }

    #[tokio::test]
    async fn reserve_and_release_update_stored_occupancy() {
        let event = EventBuilder::new(test_clock()).capacity(3).build();
        let store = InMemoryEventStore::with_events([event.clone()]);
        let admission = controller(&store, DEFAULT_LOCK_TIMEOUT);

        let after = admission.reserve(event.id, 2).await.unwrap();
        assert_eq!(after.occupancy, 2);
        assert_eq!(store.snapshot(event.id).unwrap().occupancy, 2);

        admission.release(event.id, 2).await.unwrap();
        assert_eq!(store.snapshot(event.id).unwrap().occupancy, 0);
    }

    #[tokio::test]
    async fn invalid_seat_count_leaves_occupancy_untouched() {
        let event = EventBuilder::new(test_clock()).capacity(3).build();
        let store = InMemoryEventStore::with_events([event.clone()]);
        let admission = controller(&store, DEFAULT_LOCK_TIMEOUT);

        let err = admission.reserve(event.id, 3).await.unwrap_err();
        assert_eq!(err, BookingError::InvalidSeatCount(3));
        assert_eq!(store.calls(StoreOp::Put), 0);
    }

    #[tokio::test]
    async fn failed_occupancy_write_surfaces_storage_error() {
        let event = EventBuilder::new(test_clock()).capacity(3).build();
        let store = InMemoryEventStore::with_events([event.clone()]);
        store.fail_next(StoreOp::Put, StoreError::transient("connection reset"));
        let admission = controller(&store, DEFAULT_LOCK_TIMEOUT);

        let err = admission.reserve(event.id, 1).await.unwrap_err();
        assert!(matches!(err, BookingError::Storage(_)));
        assert_eq!(store.snapshot(event.id).unwrap().occupancy, 0);
    }

    #[tokio::test]
    async fn waiting_past_lock_timeout_is_busy() {
        let event = EventBuilder::new(test_clock()).build();
        let store = InMemoryEventStore::with_events([event.clone()]);
        let admission = controller(&store, Duration::from_millis(20));

        let held = admission.enter(event.id).await.unwrap();
        let err = admission.reserve(event.id, 1).await.unwrap_err();
        assert!(matches!(err, BookingError::Busy { .. }));

        drop(held);
        assert!(admission.reserve(event.id, 1).await.is_ok());
    }

    #[tokio::test]
    async fn sections_for_different_events_do_not_contend() {
        let a = EventBuilder::new(test_clock()).build();
        let b = EventBuilder::new(test_clock()).build();
        let store = InMemoryEventStore::with_events([a.clone(), b.clone()]);
        let admission = controller(&store, Duration::from_millis(20));

        let _held = admission.enter(a.id).await.unwrap();
        assert!(admission.reserve(b.id, 1).await.is_ok());
    }

    #[tokio::test]
    async fn idle_sections_are_pruned() {
        let event = EventBuilder::new(test_clock()).build();
        let store = InMemoryEventStore::with_events([event.clone()]);
        let admission = controller(&store, DEFAULT_LOCK_TIMEOUT);

        let section = admission.enter(event.id).await.unwrap();
        assert_eq!(admission.active_sections(), 1);
        drop(section);
        assert_eq!(admission.active_sections(), 0);

        // Timed-out waiters do not leave entries behind either
        let short = controller(&store, Duration::from_millis(5));
        let held = short.enter(event.id).await.unwrap();
        assert!(short.enter(event.id).await.is_err());
        drop(held);
        assert_eq!(short.active_sections(), 0);
    }

    #[tokio::test]
    async fn reservation_is_redecided_when_another_process_wrote_first() {
        let event = EventBuilder::new(test_clock()).capacity(2).build();
        let inner = InMemoryEventStore::with_events([event.clone()]);
        let store = SharedWithAnotherProcess {
            inner: inner.clone(),
            seats: 1,
            races: AtomicUsize::new(1),
        };
        let admission = AdmissionController::new(Arc::new(store), Arc::new(test_clock()));

        // Read sees 0 free of 2, but the other process took one seat before our write
        let err = admission.reserve(event.id, 2).await.unwrap_err();

        assert_eq!(
            err,
            BookingError::CapacityExceeded {
                requested: 2,
                available: 1
            }
        );
        assert_eq!(inner.snapshot(event.id).unwrap().occupancy, 1);

        let after = admission.reserve(event.id, 1).await.unwrap();
        assert_eq!(after.occupancy, 2);
    }

    #[tokio::test]
    async fn persistent_occupancy_races_end_in_busy() {
        let event = EventBuilder::new(test_clock()).capacity(100).build();
        let inner = InMemoryEventStore::with_events([event.clone()]);
        let store = SharedWithAnotherProcess {
            inner: inner.clone(),
            seats: 1,
            races: AtomicUsize::new(MAX_OCCUPANCY_ATTEMPTS),
        };
        let admission = AdmissionController::new(Arc::new(store), Arc::new(test_clock()));

        let err = admission.release(event.id, 1).await.unwrap_err();

        assert!(matches!(err, BookingError::Busy { .. }));
        assert_eq!(
            inner.snapshot(event.id).unwrap().occupancy,
            u32::try_from(MAX_OCCUPANCY_ATTEMPTS).unwrap()
        );
    }

    #[tokio::test]
    async fn section_refuses_to_write_another_event() {
        let a = EventBuilder::new(test_clock()).build();
        let b = EventBuilder::new(test_clock()).build();
        let store = InMemoryEventStore::with_events([a.clone(), b.clone()]);
        let admission = controller(&store, DEFAULT_LOCK_TIMEOUT);

        let section = admission.enter(a.id).await.unwrap();
        let err = section.save(b).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidEvent(_)));
    }
}
