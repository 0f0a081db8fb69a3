//! Event catalog: organizer-facing CRUD over event records.
//!
//! Descriptive fields are plain data, but every write to an existing event goes
//! through the admission controller's section for that event. Occupancy is
//! therefore never overwritten with a stale copy, and an event cannot be
//! deleted while a booking for it is being admitted.

use crate::admission::AdmissionController;
use eventease_core::store::BookingStore;
use eventease_core::{
    BookingError, BookingStatus, BusinessId, Event, EventDraft, EventId, EventPatch, StoreError,
};
use std::sync::Arc;

/// Attempts at finding an unused business id before giving up.
const BUSINESS_ID_ATTEMPTS: usize = 5;

/// Organizer operations on events.
#[derive(Clone)]
pub struct EventCatalog {
    admission: AdmissionController,
    bookings: Arc<dyn BookingStore>,
}

impl std::fmt::Debug for EventCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCatalog").finish_non_exhaustive()
    }
}

fn require_text(field: &str, value: &str) -> Result<(), BookingError> {
    if value.trim().is_empty() {
        return Err(BookingError::InvalidEvent(format!("{field} must not be empty")));
    }
    Ok(())
}

fn validate(event: &Event) -> Result<(), BookingError> {
    require_text("name", &event.name)?;
    require_text("category", &event.category)?;
    require_text("location", &event.location)?;

    if event.capacity == 0 {
        return Err(BookingError::InvalidEvent(
            "capacity must be at least 1".to_string(),
        ));
    }
    if event.capacity < event.occupancy {
        return Err(BookingError::InvalidEvent(format!(
            "capacity {} is below the {} seats already booked",
            event.capacity, event.occupancy
        )));
    }
    Ok(())
}

impl EventCatalog {
    /// Create a catalog writing through `admission`.
    #[must_use]
    pub fn new(admission: AdmissionController, bookings: Arc<dyn BookingStore>) -> Self {
        Self {
            admission,
            bookings,
        }
    }

    /// Publish a new event with no seats taken.
    ///
    /// # Errors
    ///
    /// - `InvalidEvent`: an empty text field or zero capacity
    /// - `Storage`: the write failed, or no free business id was found
    #[tracing::instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_event(&self, draft: EventDraft) -> Result<Event, BookingError> {
        let now = self.admission.now();
        let mut event = Event {
            id: EventId::new(),
            business_id: BusinessId::generate(draft.starts_at),
            name: draft.name.trim().to_string(),
            description: draft.description,
            category: draft.category.trim().to_string(),
            location: draft.location.trim().to_string(),
            starts_at: draft.starts_at,
            capacity: draft.capacity,
            occupancy: 0,
            created_at: now,
            updated_at: now,
        };
        validate(&event)?;

        let mut attempt = 1;
        loop {
            match self.admission.events().put_event(event.clone()).await {
                Ok(()) => break,
                Err(StoreError::Conflict(message)) if attempt < BUSINESS_ID_ATTEMPTS => {
                    tracing::debug!(
                        business_id = %event.business_id,
                        %message,
                        "Business id taken, regenerating"
                    );
                    event.business_id = BusinessId::generate(event.starts_at);
                    attempt += 1;
                }
                Err(error) => return Err(error.into()),
            }
        }

        tracing::info!(event_id = %event.id, business_id = %event.business_id, "Event created");
        Ok(event)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// - `EventNotFound`: no such event
    /// - `InvalidEvent`: the result fails validation, including a capacity
    ///   below the seats already booked
    /// - `Busy`, `Storage`
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_event(&self, id: EventId, patch: EventPatch) -> Result<Event, BookingError> {
        let section = self.admission.enter(id).await?;
        let mut event = section
            .load()
            .await?
            .ok_or(BookingError::EventNotFound(id))?;

        if let Some(name) = patch.name {
            event.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            event.description = description;
        }
        if let Some(category) = patch.category {
            event.category = category.trim().to_string();
        }
        if let Some(location) = patch.location {
            event.location = location.trim().to_string();
        }
        if let Some(starts_at) = patch.starts_at {
            event.starts_at = starts_at;
        }
        if let Some(capacity) = patch.capacity {
            event.capacity = capacity;
        }
        validate(&event)?;

        event.updated_at = section.now();
        section.save(event.clone()).await?;

        tracing::info!(event_id = %id, "Event updated");
        Ok(event)
    }

    /// Delete an event that no confirmed booking references.
    ///
    /// # Errors
    ///
    /// - `EventNotFound`: no such event
    /// - `EventHasActiveBookings`: confirmed bookings still hold seats
    /// - `Busy`, `Storage`
    #[tracing::instrument(skip(self))]
    pub async fn delete_event(&self, id: EventId) -> Result<(), BookingError> {
        let section = self.admission.enter(id).await?;
        if section.load().await?.is_none() {
            return Err(BookingError::EventNotFound(id));
        }

        let active = self
            .bookings
            .list_event_bookings(id, Some(BookingStatus::Confirmed))
            .await?
            .len();
        if active > 0 {
            return Err(BookingError::EventHasActiveBookings { active });
        }

        if !section.remove().await? {
            return Err(BookingError::EventNotFound(id));
        }
        tracing::info!(event_id = %id, "Event deleted");
        Ok(())
    }

    /// Load one event.
    ///
    /// # Errors
    ///
    /// `EventNotFound` or `Storage`.
    pub async fn get_event(&self, id: EventId) -> Result<Event, BookingError> {
        self.admission
            .events()
            .get_event(id)
            .await?
            .ok_or(BookingError::EventNotFound(id))
    }

    /// All events ordered by start time.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the read fails.
    pub async fn list_events(&self) -> Result<Vec<Event>, BookingError> {
        let mut events = self.admission.events().list_events().await?;
        events.sort_by_key(|e| e.starts_at);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::lifecycle::BookingLifecycle;
    use chrono::Duration;
    use eventease_core::UserId;
    use eventease_testing::fixtures::{EventBuilder, draft};
    use eventease_testing::{InMemoryBookingStore, InMemoryEventStore, StoreOp, test_clock};

    fn catalog(events: &InMemoryEventStore, bookings: &InMemoryBookingStore) -> EventCatalog {
        let admission = AdmissionController::new(Arc::new(events.clone()), Arc::new(test_clock()));
        EventCatalog::new(admission, Arc::new(bookings.clone()))
    }

    #[tokio::test]
    async fn create_event_starts_empty_with_business_id() {
        let events = InMemoryEventStore::new();
        let catalog = catalog(&events, &InMemoryBookingStore::new());

        let event = catalog
            .create_event(draft(&test_clock(), 50, Duration::days(30)))
            .await
            .unwrap();

        assert_eq!(event.occupancy, 0);
        assert_eq!(event.capacity, 50);
        // Test clock starts 2025-01-01, event is 30 days later
        assert!(event.business_id.as_str().starts_with("EVT-JAN2025-"));
        assert_eq!(events.snapshot(event.id), Some(event));
    }

    #[tokio::test]
    async fn create_event_validates_input() {
        let catalog = catalog(&InMemoryEventStore::new(), &InMemoryBookingStore::new());

        let mut zero = draft(&test_clock(), 0, Duration::days(1));
        assert!(matches!(
            catalog.create_event(zero.clone()).await,
            Err(BookingError::InvalidEvent(_))
        ));

        zero.capacity = 10;
        zero.name = "   ".to_string();
        assert!(matches!(
            catalog.create_event(zero).await,
            Err(BookingError::InvalidEvent(_))
        ));
    }

    #[tokio::test]
    async fn create_event_regenerates_taken_business_id() {
        let events = InMemoryEventStore::new();
        events.fail_next(StoreOp::Put, StoreError::Conflict("taken".to_string()));
        events.fail_next(StoreOp::Put, StoreError::Conflict("taken".to_string()));
        let catalog = catalog(&events, &InMemoryBookingStore::new());

        let event = catalog
            .create_event(draft(&test_clock(), 5, Duration::days(1)))
            .await
            .unwrap();

        assert_eq!(events.calls(StoreOp::Put), 3);
        assert!(events.snapshot(event.id).is_some());
    }

    #[tokio::test]
    async fn create_event_gives_up_after_repeated_conflicts() {
        let events = InMemoryEventStore::new();
        for _ in 0..BUSINESS_ID_ATTEMPTS {
            events.fail_next(StoreOp::Put, StoreError::Conflict("taken".to_string()));
        }
        let catalog = catalog(&events, &InMemoryBookingStore::new());

        let err = catalog
            .create_event(draft(&test_clock(), 5, Duration::days(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Storage(StoreError::Conflict(_))));
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn update_keeps_occupancy_and_rejects_capacity_below_it() {
        let event = EventBuilder::new(test_clock()).capacity(10).occupancy(4).build();
        let events = InMemoryEventStore::with_events([event.clone()]);
        let catalog = catalog(&events, &InMemoryBookingStore::new());

        let updated = catalog
            .update_event(
                event.id,
                EventPatch {
                    name: Some("Renamed".to_string()),
                    capacity: Some(6),
                    ..EventPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.occupancy, 4);

        let err = catalog
            .update_event(
                event.id,
                EventPatch {
                    capacity: Some(3),
                    ..EventPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidEvent(_)));
        assert_eq!(events.snapshot(event.id).unwrap().capacity, 6);
    }

    #[tokio::test]
    async fn delete_is_refused_while_bookings_are_active() {
        let event = EventBuilder::new(test_clock()).capacity(10).build();
        let events = InMemoryEventStore::with_events([event.clone()]);
        let bookings = InMemoryBookingStore::new();
        let catalog = catalog(&events, &bookings);
        let lifecycle = BookingLifecycle::new(
            AdmissionController::new(Arc::new(events.clone()), Arc::new(test_clock())),
            Arc::new(bookings.clone()),
        );

        let user = UserId::new("alice");
        let booking = lifecycle.create_booking(&user, event.id, 2).await.unwrap();

        assert_eq!(
            catalog.delete_event(event.id).await,
            Err(BookingError::EventHasActiveBookings { active: 1 })
        );

        lifecycle.cancel_booking(&user, booking.id).await.unwrap();
        catalog.delete_event(event.id).await.unwrap();

        assert_eq!(
            catalog.get_event(event.id).await,
            Err(BookingError::EventNotFound(event.id))
        );
    }

    #[tokio::test]
    async fn list_events_is_ordered_by_start() {
        let later = EventBuilder::new(test_clock()).starts_in(Duration::days(9)).build();
        let sooner = EventBuilder::new(test_clock()).starts_in(Duration::days(2)).build();
        let events = InMemoryEventStore::with_events([later.clone(), sooner.clone()]);
        let catalog = catalog(&events, &InMemoryBookingStore::new());

        let listed = catalog.list_events().await.unwrap();
        assert_eq!(
            listed.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![sooner.id, later.id]
        );
    }
}
