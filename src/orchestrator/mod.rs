//! Top-level coordination of quotes, bookings and trip simulators.
//!
//! The orchestrator is the only component that talks to the store on behalf of a rider. It turns
//! a [`BookingRequest`] into a persisted, confirmed [`Booking`], cancels bookings that have not yet
//! taken off, and binds exactly one trip simulator to each booking in transit.

pub mod config;
pub mod error;
mod locks;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::booking::{
    Booking, BookingId, BookingPatch, BookingRequest, BookingStatus, NewBooking, ServiceTier,
};
use crate::clock::{Clock, SystemClock};
use crate::geo::Location;
use crate::pricing::PricingQuote;
use crate::state_machine::error::InvalidTransition;
use crate::state_machine::lifecycle::{LifecycleEvent, LifecycleMachine};
use crate::store::BookingStore;
use crate::trip::error::TripNotFound;
use crate::trip::{self, TripHandle, TripRegistry};

pub use self::config::OrchestratorConfig;
pub use self::error::BookingError;

pub struct BookingOrchestrator<S, C = SystemClock> {
    store: Arc<S>,
    clock: C,
    config: OrchestratorConfig,
    trips: Arc<TripRegistry>,
    locks: locks::BookingLocks,
}

impl<S: BookingStore> BookingOrchestrator<S> {
    /// An orchestrator on the system clock with the default configuration.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, SystemClock, OrchestratorConfig::default())
    }
}

impl<S: BookingStore, C: Clock> BookingOrchestrator<S, C> {
    pub fn with_clock(store: Arc<S>, clock: C, config: OrchestratorConfig) -> Self {
        Self {
            store,
            clock,
            config,
            trips: Arc::new(TripRegistry::new()),
            locks: locks::BookingLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// A live fare estimate at the current wall-clock time. Nothing is persisted.
    pub fn quote(
        &self,
        pickup: &Location,
        destination: &Location,
        tier: ServiceTier,
    ) -> PricingQuote {
        self.config
            .pricing
            .quote(pickup, destination, tier, self.clock.local_now())
    }

    /// Price and persist a new booking for the signed-in user.
    ///
    /// The booking is returned `confirmed`. If the store rejects the write the booking never
    /// existed as far as any reader can tell, and the caller may simply retry.
    pub async fn create_booking(&self, request: BookingRequest) -> Result<Booking, BookingError> {
        let request = request.validate()?;
        let user_id = self
            .store
            .current_user()
            .await
            .ok_or(BookingError::NotAuthenticated)?;

        let quote = self.quote(&request.pickup, &request.destination, request.tier);

        // The record is written already confirmed: it only becomes visible if the write succeeds.
        let mut lifecycle = LifecycleMachine::new();
        let status = lifecycle.transition(LifecycleEvent::Persisted)?;

        let booking = self
            .store
            .insert(NewBooking {
                user_id,
                pickup: request.pickup,
                destination: request.destination,
                tier: request.tier,
                quote,
                status,
                estimated_duration_min: quote.estimated_duration_min,
                created_at: self.clock.now(),
            })
            .await
            .inspect_err(|e| warn!(error = %e, "Booking could not be persisted"))?;

        info!(
            booking_id = %booking.id,
            user_id = %booking.user_id,
            tier = %booking.tier,
            distance_km = quote.base_distance_km,
            price = quote.final_price,
            "Booking confirmed"
        );

        Ok(booking)
    }

    /// Cancel a booking that has not taken off yet.
    pub async fn cancel_booking(&self, id: BookingId) -> Result<Booking, BookingError> {
        let guard = self.locks.acquire(id).await;
        let booking = self.store.get(id).await?;
        let next = booking.status.apply(LifecycleEvent::Cancel)?;

        let booking = self.store.update(id, BookingPatch::status(next)).await?;
        self.locks.retire(id, guard);
        if let Ok(session_id) = self.trips.cancel(id) {
            debug!(booking_id = %id, session_id = %session_id, "Stopped trip of cancelled booking");
        }

        info!(booking_id = %id, "Booking cancelled");
        Ok(booking)
    }

    /// Put the booking in transit and bind a fresh trip simulator to it.
    ///
    /// A confirmed booking is moved to `in_transit` first; a booking already in transit is simply
    /// re-attached. Any simulator previously bound to the booking is cancelled before the new one
    /// starts. The simulator runs until arrival, a terminal status pushed by the store, or until
    /// the returned handle is dropped.
    ///
    /// Status changes on one booking are serialized: a concurrent [`cancel_booking`] either lands
    /// before this reads the status, and the attach fails, or after the booking is in transit,
    /// and the cancel fails.
    ///
    /// [`cancel_booking`]: Self::cancel_booking
    pub async fn attach_simulator(&self, booking: &Booking) -> Result<TripHandle, BookingError> {
        let _guard = self.locks.acquire(booking.id).await;
        let current = self.store.get(booking.id).await?;

        let in_transit = match current.status {
            BookingStatus::InTransit => current,
            BookingStatus::Confirmed => {
                let next = current.status.apply(LifecycleEvent::TransitStarted)?;
                self.store.update(booking.id, BookingPatch::status(next)).await?
            }
            from => {
                return Err(InvalidTransition {
                    from,
                    event: LifecycleEvent::TransitStarted,
                }
                .into());
            }
        };

        let feed = match self.store.subscribe(booking.id).await {
            Ok(feed) => Some(feed),
            Err(e) => {
                warn!(
                    booking_id = %booking.id,
                    error = %e,
                    "No change feed, trip will not reconcile"
                );
                None
            }
        };

        Ok(trip::spawn(
            Arc::clone(&self.store),
            Arc::clone(&self.trips),
            &in_transit,
            feed,
            &self.config.simulator,
        ))
    }

    /// Stop the simulator bound to `id` without touching the booking.
    pub fn detach(&self, id: BookingId) -> Result<(), TripNotFound> {
        let session_id = self.trips.cancel(id)?;
        debug!(booking_id = %id, session_id = %session_id, "Trip detached by orchestrator");
        Ok(())
    }

    pub fn is_tracking(&self, id: BookingId) -> bool {
        self.trips.is_active(id)
    }

    pub fn active_trips(&self) -> usize {
        self.trips.active_count()
    }

    pub async fn booking(&self, id: BookingId) -> Result<Booking, BookingError> {
        Ok(self.store.get(id).await?)
    }

    /// The signed-in user's bookings, newest first.
    pub async fn history(&self) -> Result<Vec<Booking>, BookingError> {
        let user_id = self
            .store
            .current_user()
            .await
            .ok_or(BookingError::NotAuthenticated)?;

        Ok(self.store.list_by_user(&user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::booking::error::ValidationError;
    use crate::clock::FixedClock;
    use crate::store::{MemoryStore, StoreError, Subscription};
    use crate::trip::{SimulatorConfig, TripOutcome};
    use crate::user::UserId;

    type TestOrchestrator<S = MemoryStore> = BookingOrchestrator<S, FixedClock>;

    /// A store whose reads take a while to come back, leaving room for other calls to interleave.
    struct SlowReads(MemoryStore);

    impl BookingStore for SlowReads {
        async fn insert(&self, booking: NewBooking) -> Result<Booking, StoreError> {
            self.0.insert(booking).await
        }

        async fn update(&self, id: BookingId, patch: BookingPatch) -> Result<Booking, StoreError> {
            self.0.update(id, patch).await
        }

        async fn get(&self, id: BookingId) -> Result<Booking, StoreError> {
            let booking = self.0.get(id).await;
            tokio::time::sleep(Duration::from_millis(10)).await;
            booking
        }

        async fn list_by_user(&self, user: &UserId) -> Result<Vec<Booking>, StoreError> {
            self.0.list_by_user(user).await
        }

        async fn subscribe(&self, id: BookingId) -> Result<Subscription, StoreError> {
            self.0.subscribe(id).await
        }

        async fn current_user(&self) -> Option<UserId> {
            self.0.current_user().await
        }
    }

    fn orchestrator<S: BookingStore>(store: S) -> TestOrchestrator<S> {
        BookingOrchestrator::with_clock(
            Arc::new(store),
            FixedClock::at_hour(14),
            OrchestratorConfig::builder()
                .simulator(
                    SimulatorConfig::builder()
                        .tick_interval(Duration::from_secs(3))
                        .build(),
                )
                .build(),
        )
    }

    fn signed_in() -> TestOrchestrator {
        orchestrator(MemoryStore::with_user("rider-1"))
    }

    fn long_request() -> BookingRequest {
        BookingRequest::new(
            Location::new(12.97, 77.59, "Cubbon Park"),
            Location::new(12.90, 77.50, "Kengeri"),
            ServiceTier::Economy,
        )
    }

    fn short_request() -> BookingRequest {
        BookingRequest::new(
            Location::new(12.9716, 77.5946, "MG Road"),
            Location::new(12.9352, 77.6146, "Koramangala"),
            ServiceTier::Premium,
        )
    }

    fn same_place_request() -> BookingRequest {
        let here = Location::new(12.9716, 77.5946, "MG Road");
        BookingRequest::new(here.clone(), here, ServiceTier::Economy)
    }

    #[tokio::test]
    async fn test_create_booking_confirms_and_persists() {
        let orchestrator = signed_in();

        let booking = orchestrator.create_booking(short_request()).await.unwrap();

        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.user_id.as_str(), "rider-1");
        assert_eq!(booking.created_at, FixedClock::at_hour(14).now());
        assert_eq!(booking.estimated_duration_min, booking.quote.estimated_duration_min);
        assert_eq!(booking.quote.surge_multiplier, 1.0);
        assert_eq!(orchestrator.booking(booking.id).await.unwrap(), booking);
    }

    #[tokio::test]
    async fn test_create_booking_requires_user() {
        let orchestrator = orchestrator(MemoryStore::new());

        let result = orchestrator.create_booking(short_request()).await;

        assert_eq!(result.unwrap_err(), BookingError::NotAuthenticated);
        assert!(orchestrator.store().is_empty());
    }

    #[tokio::test]
    async fn test_create_booking_validates_before_pricing() {
        let orchestrator = signed_in();
        let request = BookingRequest {
            tier: None,
            ..short_request()
        };

        let result = orchestrator.create_booking(request).await;

        assert_eq!(
            result.unwrap_err(),
            BookingError::Validation(ValidationError::MissingTier)
        );
        assert!(orchestrator.store().is_empty());
    }

    #[tokio::test]
    async fn test_failed_persist_is_invisible_and_retryable() {
        let orchestrator = signed_in();
        orchestrator.store().fail_next_writes(1);

        let result = orchestrator.create_booking(short_request()).await;

        assert!(matches!(
            result,
            Err(BookingError::Persistence(StoreError::Unavailable(_)))
        ));
        assert!(orchestrator.store().is_empty());
        assert!(orchestrator.history().await.unwrap().is_empty());

        let retried = orchestrator.create_booking(short_request()).await.unwrap();
        assert_eq!(retried.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_cancel_confirmed_booking() {
        let orchestrator = signed_in();
        let booking = orchestrator.create_booking(short_request()).await.unwrap();

        let cancelled = orchestrator.cancel_booking(booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(orchestrator.locks.len(), 0);

        let again = orchestrator.cancel_booking(booking.id).await;
        assert_eq!(
            again.unwrap_err(),
            BookingError::InvalidTransition(InvalidTransition {
                from: BookingStatus::Cancelled,
                event: LifecycleEvent::Cancel,
            })
        );
    }

    #[tokio::test]
    async fn test_cancel_unknown_booking() {
        let orchestrator = signed_in();
        let id = BookingId::generate();

        let result = orchestrator.cancel_booking(id).await;

        assert_eq!(result.unwrap_err(), BookingError::NotFound { booking_id: id });
    }

    #[tokio::test(start_paused = true)]
    async fn test_cannot_cancel_in_transit() {
        let orchestrator = signed_in();
        let booking = orchestrator.create_booking(long_request()).await.unwrap();
        let _trip = orchestrator.attach_simulator(&booking).await.unwrap();

        let result = orchestrator.cancel_booking(booking.id).await;

        assert!(matches!(
            result,
            Err(BookingError::InvalidTransition(InvalidTransition {
                from: BookingStatus::InTransit,
                ..
            }))
        ));
        let stored = orchestrator.booking(booking.id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::InTransit);
        assert!(orchestrator.is_tracking(booking.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_trip_runs_to_completion() {
        let orchestrator = signed_in();
        let booking = orchestrator.create_booking(long_request()).await.unwrap();
        let started = tokio::time::Instant::now();

        let trip = orchestrator.attach_simulator(&booking).await.unwrap();
        assert_eq!(trip.progress().status, BookingStatus::InTransit);
        let watch = trip.watch();

        assert_eq!(trip.finished().await, TripOutcome::Completed);

        let last = *watch.borrow();
        assert_eq!(last.ticks, 44);
        assert_eq!(last.status, BookingStatus::Completed);
        assert_eq!(last.eta_min, booking.estimated_duration_min - 44.0 * 0.5);
        assert!(last.remaining_km < 0.2);
        assert_eq!(started.elapsed(), Duration::from_secs(44 * 3));

        let stored = orchestrator.booking(booking.id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Completed);
        assert_eq!(orchestrator.active_trips(), 0);
        assert_eq!(orchestrator.store().subscriber_count(booking.id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_place_completes_without_ticking() {
        let orchestrator = signed_in();
        let booking = orchestrator.create_booking(same_place_request()).await.unwrap();
        assert_eq!(booking.quote.final_price, 0.0);
        let started = tokio::time::Instant::now();

        let trip = orchestrator.attach_simulator(&booking).await.unwrap();
        let watch = trip.watch();

        assert_eq!(trip.finished().await, TripOutcome::Completed);
        assert_eq!(watch.borrow().ticks, 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(
            orchestrator.booking(booking.id).await.unwrap().status,
            BookingStatus::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_detach_stops_ticking() {
        let orchestrator = signed_in();
        let booking = orchestrator.create_booking(long_request()).await.unwrap();
        let trip = orchestrator.attach_simulator(&booking).await.unwrap();
        let watch = trip.watch();

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(watch.borrow().ticks, 2);

        trip.detach();
        assert_eq!(orchestrator.active_trips(), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(watch.borrow().ticks, 2);
        assert_eq!(
            orchestrator.booking(booking.id).await.unwrap().status,
            BookingStatus::InTransit
        );
        assert_eq!(orchestrator.store().subscriber_count(booking.id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reattach_replaces_previous_trip() {
        let orchestrator = signed_in();
        let booking = orchestrator.create_booking(long_request()).await.unwrap();

        let first = orchestrator.attach_simulator(&booking).await.unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;
        let second = orchestrator.attach_simulator(&booking).await.unwrap();

        assert_ne!(first.session_id(), second.session_id());
        assert_eq!(first.finished().await, TripOutcome::Detached);
        assert_eq!(orchestrator.active_trips(), 1);
        assert!(orchestrator.is_tracking(booking.id));

        assert_eq!(second.finished().await, TripOutcome::Completed);
        assert_eq!(orchestrator.active_trips(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_completion_stops_simulator() {
        let orchestrator = signed_in();
        let booking = orchestrator.create_booking(long_request()).await.unwrap();
        let trip = orchestrator.attach_simulator(&booking).await.unwrap();
        let watch = trip.watch();

        tokio::time::sleep(Duration::from_secs(10)).await;
        orchestrator
            .store()
            .update(booking.id, BookingPatch::status(BookingStatus::Completed))
            .await
            .unwrap();

        assert_eq!(trip.finished().await, TripOutcome::CompletedRemotely);
        let last = *watch.borrow();
        assert_eq!(last.ticks, 3);
        assert_eq!(last.status, BookingStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_write_failure_freezes_vehicle() {
        let orchestrator = signed_in();
        let booking = orchestrator.create_booking(short_request()).await.unwrap();
        let trip = orchestrator.attach_simulator(&booking).await.unwrap();
        orchestrator.store().fail_next_writes(1);
        let watch = trip.watch();

        assert_eq!(trip.finished().await, TripOutcome::Frozen);

        let last = *watch.borrow();
        assert_eq!(last.status, BookingStatus::InTransit);
        assert_eq!(
            orchestrator.booking(booking.id).await.unwrap().status,
            BookingStatus::InTransit
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_requires_confirmed_booking() {
        let orchestrator = signed_in();
        let booking = orchestrator.create_booking(short_request()).await.unwrap();
        orchestrator.cancel_booking(booking.id).await.unwrap();

        let result = orchestrator.attach_simulator(&booking).await;

        assert!(matches!(
            result,
            Err(BookingError::InvalidTransition(InvalidTransition {
                from: BookingStatus::Cancelled,
                event: LifecycleEvent::TransitStarted,
            }))
        ));
        assert_eq!(orchestrator.active_trips(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_cancel_wins_over_attach() {
        let orchestrator = orchestrator(SlowReads(MemoryStore::with_user("rider-1")));
        let booking = orchestrator.create_booking(long_request()).await.unwrap();

        let (cancelled, attached) = tokio::join!(
            orchestrator.cancel_booking(booking.id),
            orchestrator.attach_simulator(&booking),
        );

        assert_eq!(cancelled.unwrap().status, BookingStatus::Cancelled);
        assert!(matches!(
            attached,
            Err(BookingError::InvalidTransition(InvalidTransition {
                from: BookingStatus::Cancelled,
                event: LifecycleEvent::TransitStarted,
            }))
        ));
        assert_eq!(
            orchestrator.booking(booking.id).await.unwrap().status,
            BookingStatus::Cancelled
        );
        assert!(!orchestrator.is_tracking(booking.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_attach_wins_over_cancel() {
        let orchestrator = orchestrator(SlowReads(MemoryStore::with_user("rider-1")));
        let booking = orchestrator.create_booking(long_request()).await.unwrap();

        let (attached, cancelled) = tokio::join!(
            orchestrator.attach_simulator(&booking),
            orchestrator.cancel_booking(booking.id),
        );

        let _trip = attached.unwrap();
        assert_eq!(
            cancelled.unwrap_err(),
            BookingError::InvalidTransition(InvalidTransition {
                from: BookingStatus::InTransit,
                event: LifecycleEvent::Cancel,
            })
        );
        assert_eq!(
            orchestrator.booking(booking.id).await.unwrap().status,
            BookingStatus::InTransit
        );
        assert!(orchestrator.is_tracking(booking.id));
    }

    #[tokio::test]
    async fn test_history_lists_own_bookings() {
        let store = Arc::new(MemoryStore::with_user("rider-1"));
        let orchestrator = BookingOrchestrator::new(Arc::clone(&store));

        let first = orchestrator.create_booking(short_request()).await.unwrap();
        let second = orchestrator.create_booking(long_request()).await.unwrap();
        store.sign_in("rider-2");
        orchestrator.create_booking(short_request()).await.unwrap();
        store.sign_in("rider-1");

        let history = orchestrator.history().await.unwrap();
        let ids: Vec<_> = history.iter().map(|b| b.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.id) && ids.contains(&second.id));

        store.sign_out();
        assert_eq!(
            orchestrator.history().await.unwrap_err(),
            BookingError::NotAuthenticated
        );
    }

    #[test]
    fn test_quote_uses_injected_clock() {
        let orchestrator = BookingOrchestrator::with_clock(
            Arc::new(MemoryStore::new()),
            FixedClock::at_hour(9),
            OrchestratorConfig::default(),
        );
        let pickup = Location::new(12.9716, 77.5946, "MG Road");
        let destination = Location::new(12.9352, 77.6146, "Koramangala");

        let quote = orchestrator.quote(&pickup, &destination, ServiceTier::Economy);

        assert_eq!(quote.surge_multiplier, 1.5);
    }
}
