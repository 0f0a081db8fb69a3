//! In-memory store implementations for fast, deterministic testing.
//!
//! - [`InMemoryEventStore`]: `HashMap`-backed [`EventStore`]
//! - [`InMemoryBookingStore`]: `HashMap`-backed [`BookingStore`]
//!
//! Both enforce the same uniqueness and capacity rules as the `PostgreSQL`
//! schema and support scripted fault injection so compensation and retry paths
//! can be exercised. They also back the server's `memory` storage backend.

use eventease_core::store::{BookingStore, EventStore, StoreFuture};
use eventease_core::{
    Booking, BookingId, BookingStatus, DateTime, Event, EventId, StoreError, UserId, Utc,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Which store operation a scripted fault applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// Single-record reads (`get_event`, `get_booking`, `get_active_booking`)
    Get,
    /// Writes (`put_event`, `update_occupancy`, `put_booking`)
    Put,
    /// Listings
    List,
    /// Deletes
    Delete,
}

/// Queue of errors returned, in order, by the next calls of each operation.
#[derive(Clone, Debug, Default)]
struct FaultPlan {
    queued: Arc<Mutex<HashMap<StoreOp, VecDeque<StoreError>>>>,
}

impl FaultPlan {
    fn push(&self, op: StoreOp, error: StoreError) {
        lock(&self.queued)
            .entry(op)
            .or_default()
            .push_back(error);
    }

    fn take(&self, op: StoreOp) -> Option<StoreError> {
        lock(&self.queued)
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
    }
}

/// Per-operation call counters, useful for asserting retries.
#[derive(Clone, Debug, Default)]
struct CallCounts {
    counts: Arc<Mutex<HashMap<StoreOp, usize>>>,
}

impl CallCounts {
    fn hit(&self, op: StoreOp) {
        *lock(&self.counts).entry(op).or_default() += 1;
    }

    fn get(&self, op: StoreOp) -> usize {
        lock(&self.counts).get(&op).copied().unwrap_or(0)
    }
}

// ============================================================================
// Events
// ============================================================================

/// In-memory event store.
///
/// # Example
///
/// ```
/// use eventease_testing::{InMemoryEventStore, fixtures::EventBuilder, test_clock};
/// use eventease_core::store::EventStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryEventStore::new();
/// let event = EventBuilder::new(test_clock()).capacity(2).build();
///
/// store.put_event(event.clone()).await?;
/// assert_eq!(store.get_event(event.id).await?, Some(event));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<HashMap<EventId, Event>>>,
    faults: FaultPlan,
    calls: CallCounts,
}

impl InMemoryEventStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `events`
    #[must_use]
    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        let store = Self::new();
        {
            let mut map = write(&store.events);
            for event in events {
                map.insert(event.id, event);
            }
        }
        store
    }

    /// Make the next call of `op` fail with `error`. Calls queue up.
    pub fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.faults.push(op, error);
    }

    /// How many times `op` was invoked, failed calls included
    #[must_use]
    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls.get(op)
    }

    /// Synchronous snapshot of one event, for assertions
    #[must_use]
    pub fn snapshot(&self, id: EventId) -> Option<Event> {
        read(&self.events).get(&id).cloned()
    }

    /// Remove an event behind the engine's back (simulates an external delete)
    pub fn remove(&self, id: EventId) {
        write(&self.events).remove(&id);
    }

    /// Overwrite an event's occupancy behind the engine's back (simulates
    /// another process admitting or releasing seats)
    pub fn set_occupancy(&self, id: EventId, occupancy: u32) {
        if let Some(event) = write(&self.events).get_mut(&id) {
            event.occupancy = occupancy;
        }
    }

    /// Number of stored events
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.events).len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.events).is_empty()
    }

    fn fault(&self, op: StoreOp) -> Option<StoreError> {
        self.calls.hit(op);
        self.faults.take(op)
    }
}

impl EventStore for InMemoryEventStore {
    fn get_event(&self, id: EventId) -> StoreFuture<'_, Option<Event>> {
        let result = match self.fault(StoreOp::Get) {
            Some(error) => Err(error),
            None => Ok(read(&self.events).get(&id).cloned()),
        };
        Box::pin(async move { result })
    }

    fn put_event(&self, mut event: Event) -> StoreFuture<'_, ()> {
        let result = match self.fault(StoreOp::Put) {
            Some(error) => Err(error),
            None => {
                let mut map = write(&self.events);
                let taken = map
                    .values()
                    .any(|e| e.id != event.id && e.business_id == event.business_id);
                if let Some(existing) = map.get(&event.id) {
                    event.occupancy = existing.occupancy;
                }
                if taken {
                    Err(StoreError::Conflict(format!(
                        "business id {} already in use",
                        event.business_id
                    )))
                } else if event.occupancy > event.capacity {
                    Err(StoreError::permanent(format!(
                        "event {}: occupancy {} exceeds capacity {}",
                        event.id, event.occupancy, event.capacity
                    )))
                } else {
                    map.insert(event.id, event);
                    Ok(())
                }
            }
        };
        Box::pin(async move { result })
    }

    fn update_occupancy(
        &self,
        id: EventId,
        expected: u32,
        occupancy: u32,
        updated_at: DateTime<Utc>,
    ) -> StoreFuture<'_, ()> {
        let result = match self.fault(StoreOp::Put) {
            Some(error) => Err(error),
            None => match write(&self.events).get_mut(&id) {
                None => Err(StoreError::NotFound(format!("event {id}"))),
                Some(event) if event.occupancy != expected => Err(StoreError::Conflict(format!(
                    "event {id}: occupancy is {}, expected {expected}",
                    event.occupancy
                ))),
                Some(event) if occupancy > event.capacity => Err(StoreError::permanent(format!(
                    "event {id}: occupancy {occupancy} exceeds capacity {}",
                    event.capacity
                ))),
                Some(event) => {
                    event.occupancy = occupancy;
                    event.updated_at = updated_at;
                    Ok(())
                }
            },
        };
        Box::pin(async move { result })
    }

    fn list_events(&self) -> StoreFuture<'_, Vec<Event>> {
        let result = match self.fault(StoreOp::List) {
            Some(error) => Err(error),
            None => {
                let mut events: Vec<Event> =
                    read(&self.events).values().cloned().collect();
                events.sort_by_key(|e| (e.starts_at, e.id));
                Ok(events)
            }
        };
        Box::pin(async move { result })
    }

    fn delete_event(&self, id: EventId) -> StoreFuture<'_, bool> {
        let result = match self.fault(StoreOp::Delete) {
            Some(error) => Err(error),
            None => Ok(write(&self.events).remove(&id).is_some()),
        };
        Box::pin(async move { result })
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// In-memory booking store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
    faults: FaultPlan,
    calls: CallCounts,
    puts: Arc<AtomicUsize>,
}

impl InMemoryBookingStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` fail with `error`. Calls queue up.
    pub fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.faults.push(op, error);
    }

    /// How many times `op` was invoked, failed calls included
    #[must_use]
    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls.get(op)
    }

    /// Number of successful writes
    #[must_use]
    pub fn successful_puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Synchronous snapshot of one booking, for assertions
    #[must_use]
    pub fn snapshot(&self, id: BookingId) -> Option<Booking> {
        read(&self.bookings).get(&id).cloned()
    }

    /// All stored bookings, in no particular order
    #[must_use]
    pub fn all(&self) -> Vec<Booking> {
        read(&self.bookings).values().cloned().collect()
    }

    /// Number of stored bookings
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.bookings).len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.bookings).is_empty()
    }

    fn fault(&self, op: StoreOp) -> Option<StoreError> {
        self.calls.hit(op);
        self.faults.take(op)
    }
}

impl BookingStore for InMemoryBookingStore {
    fn get_booking(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        let result = match self.fault(StoreOp::Get) {
            Some(error) => Err(error),
            None => Ok(read(&self.bookings).get(&id).cloned()),
        };
        Box::pin(async move { result })
    }

    fn get_active_booking(
        &self,
        user_id: &UserId,
        event_id: EventId,
    ) -> StoreFuture<'_, Option<Booking>> {
        let result = match self.fault(StoreOp::Get) {
            Some(error) => Err(error),
            None => Ok(self
                .bookings
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .values()
                .find(|b| b.is_active() && b.event_id == event_id && &b.user_id == user_id)
                .cloned()),
        };
        Box::pin(async move { result })
    }

    fn put_booking(&self, booking: Booking) -> StoreFuture<'_, ()> {
        let result = match self.fault(StoreOp::Put) {
            Some(error) => Err(error),
            None => {
                let mut map = write(&self.bookings);
                let duplicate = booking.is_active()
                    && map.values().any(|b| {
                        b.id != booking.id
                            && b.is_active()
                            && b.event_id == booking.event_id
                            && b.user_id == booking.user_id
                    });
                if duplicate {
                    Err(StoreError::Conflict(format!(
                        "user {} already holds a confirmed booking for event {}",
                        booking.user_id, booking.event_id
                    )))
                } else {
                    map.insert(booking.id, booking);
                    self.puts.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        };
        Box::pin(async move { result })
    }

    fn list_user_bookings(
        &self,
        user_id: &UserId,
        status: Option<BookingStatus>,
    ) -> StoreFuture<'_, Vec<Booking>> {
        let result = match self.fault(StoreOp::List) {
            Some(error) => Err(error),
            None => {
                let mut bookings: Vec<Booking> = self
                    .bookings
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .values()
                    .filter(|b| &b.user_id == user_id)
                    .filter(|b| status.is_none_or(|s| b.status == s))
                    .cloned()
                    .collect();
                bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Ok(bookings)
            }
        };
        Box::pin(async move { result })
    }

    fn list_event_bookings(
        &self,
        event_id: EventId,
        status: Option<BookingStatus>,
    ) -> StoreFuture<'_, Vec<Booking>> {
        let result = match self.fault(StoreOp::List) {
            Some(error) => Err(error),
            None => {
                let mut bookings: Vec<Booking> = self
                    .bookings
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .values()
                    .filter(|b| b.event_id == event_id)
                    .filter(|b| status.is_none_or(|s| b.status == s))
                    .cloned()
                    .collect();
                bookings.sort_by_key(|b| b.created_at);
                Ok(bookings)
            }
        };
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;
    use crate::fixtures::EventBuilder;
    use crate::mocks::test_clock;
    use eventease_core::environment::Clock;

    #[tokio::test]
    async fn put_event_rejects_duplicate_business_id() {
        let store = InMemoryEventStore::new();
        let first = EventBuilder::new(test_clock()).business_id("EVT-JAN2025-AAA").build();
        let second = EventBuilder::new(test_clock()).business_id("EVT-JAN2025-AAA").build();

        store.put_event(first.clone()).await.unwrap();
        let err = store.put_event(second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Re-writing the same event is an upsert, not a conflict
        store.put_event(first).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn poisoned_lock_keeps_serving() {
        let event = EventBuilder::new(test_clock()).build();
        let store = InMemoryEventStore::with_events([event.clone()]);

        let events = Arc::clone(&store.events);
        let _ = std::thread::spawn(move || {
            let _guard = events.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(store.events.is_poisoned());

        assert_eq!(store.get_event(event.id).await.unwrap(), Some(event.clone()));
        store.update_occupancy(event.id, 0, 1, test_clock().now()).await.unwrap();
        assert_eq!(store.snapshot(event.id).unwrap().occupancy, 1);
    }

    #[tokio::test]
    async fn put_event_keeps_stored_occupancy() {
        let store = InMemoryEventStore::new();
        let event = EventBuilder::new(test_clock()).capacity(5).build();
        store.put_event(event.clone()).await.unwrap();
        store.set_occupancy(event.id, 3);

        let mut edited = event.clone();
        edited.name = "Renamed".to_string();
        store.put_event(edited).await.unwrap();

        let stored = store.snapshot(event.id).unwrap();
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.occupancy, 3);
    }

    #[tokio::test]
    async fn update_occupancy_compares_before_setting() {
        let event = EventBuilder::new(test_clock()).capacity(4).build();
        let store = InMemoryEventStore::with_events([event.clone()]);
        let now = test_clock().now();

        store.update_occupancy(event.id, 0, 2, now).await.unwrap();
        assert!(matches!(
            store.update_occupancy(event.id, 0, 1, now).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store.update_occupancy(event.id, 2, 5, now).await,
            Err(StoreError::Database { transient: false, .. })
        ));
        assert!(matches!(
            store.update_occupancy(EventId::new(), 0, 1, now).await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.snapshot(event.id).unwrap().occupancy, 2);
    }

    #[tokio::test]
    async fn scripted_faults_are_consumed_in_order() {
        let store = InMemoryBookingStore::new();
        store.fail_next(StoreOp::Put, StoreError::transient("first"));
        store.fail_next(StoreOp::Put, StoreError::permanent("second"));

        let booking = Booking::confirmed(
            UserId::new("u-1"),
            EventId::new(),
            1,
            test_clock().now(),
        );

        assert_eq!(
            store.put_booking(booking.clone()).await,
            Err(StoreError::transient("first"))
        );
        assert_eq!(
            store.put_booking(booking.clone()).await,
            Err(StoreError::permanent("second"))
        );
        assert!(store.put_booking(booking).await.is_ok());
        assert_eq!(store.calls(StoreOp::Put), 3);
        assert_eq!(store.successful_puts(), 1);
    }

    #[tokio::test]
    async fn second_confirmed_booking_for_same_pair_conflicts() {
        let store = InMemoryBookingStore::new();
        let now = test_clock().now();
        let event_id = EventId::new();
        let user = UserId::new("u-1");

        let first = Booking::confirmed(user.clone(), event_id, 1, now);
        store.put_booking(first.clone()).await.unwrap();

        let second = Booking::confirmed(user.clone(), event_id, 2, now);
        assert!(matches!(
            store.put_booking(second.clone()).await,
            Err(StoreError::Conflict(_))
        ));

        // Once the first is cancelled, a new confirmed booking is allowed
        store.put_booking(first.cancel(now)).await.unwrap();
        store.put_booking(second.clone()).await.unwrap();

        let active = store.get_active_booking(&user, event_id).await.unwrap();
        assert_eq!(active.map(|b| b.id), Some(second.id));
    }

    #[tokio::test]
    async fn list_user_bookings_filters_by_status() {
        let store = InMemoryBookingStore::new();
        let now = test_clock().now();
        let user = UserId::new("u-1");

        let kept = Booking::confirmed(user.clone(), EventId::new(), 1, now);
        let dropped = Booking::confirmed(user.clone(), EventId::new(), 1, now).cancel(now);
        store.put_booking(kept.clone()).await.unwrap();
        store.put_booking(dropped).await.unwrap();

        let confirmed = store
            .list_user_bookings(&user, Some(BookingStatus::Confirmed))
            .await
            .unwrap();
        assert_eq!(confirmed, vec![kept]);

        let all = store.list_user_bookings(&user, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
