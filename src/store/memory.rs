use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use super::{BookingStore, StoreError, Subscription};
use crate::booking::{Booking, BookingId, BookingPatch, NewBooking};
use crate::user::UserId;

#[derive(Debug)]
struct Subscriber {
    id: u64,
    sender: mpsc::UnboundedSender<Booking>,
}

type SubscriberMap = DashMap<BookingId, Vec<Subscriber>, ahash::RandomState>;

/// An in-process [`BookingStore`].
///
/// Bookings and change feeds live in concurrent maps. Sign-in state and write failures can be set
/// directly, which is what the demo binaries and the orchestrator tests use.
#[derive(Debug)]
pub struct MemoryStore {
    bookings: DashMap<BookingId, Booking, ahash::RandomState>,
    subscribers: Arc<SubscriberMap>,
    next_subscriber: AtomicU64,
    user: Mutex<Option<UserId>>,
    failing_writes: AtomicU32,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            bookings: DashMap::default(),
            subscribers: Arc::new(DashMap::default()),
            next_subscriber: AtomicU64::new(0),
            user: Mutex::new(None),
            failing_writes: AtomicU32::new(0),
            offline: AtomicBool::new(false),
        }
    }

    /// A store with `user` already signed in.
    pub fn with_user(user: impl Into<UserId>) -> Self {
        let store = Self::new();
        store.sign_in(user);
        store
    }

    pub fn sign_in(&self, user: impl Into<UserId>) {
        *self.user.lock().expect("user lock poisoned") = Some(user.into());
    }

    pub fn sign_out(&self) {
        *self.user.lock().expect("user lock poisoned") = None;
    }

    /// Make the next `count` inserts/updates fail with [`StoreError::Unavailable`].
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// While offline every operation except `current_user` fails.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    /// Number of open change feeds for `id`.
    pub fn subscriber_count(&self, id: BookingId) -> usize {
        self.subscribers.get(&id).map_or(0, |subs| subs.len())
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        self.check_online()?;

        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("write rejected".to_string()));
        }
        Ok(())
    }

    fn publish(&self, booking: &Booking) {
        if let Some(mut subs) = self.subscribers.get_mut(&booking.id) {
            subs.retain(|sub| sub.sender.send(booking.clone()).is_ok());
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn release_subscriber(subscribers: &Weak<SubscriberMap>, booking_id: BookingId, id: u64) {
    let Some(subscribers) = subscribers.upgrade() else {
        return;
    };

    subscribers.remove_if_mut(&booking_id, |_, subs| {
        subs.retain(|sub| sub.id != id);
        subs.is_empty()
    });
}

impl BookingStore for MemoryStore {
    async fn insert(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        self.check_write()?;

        let booking = booking.into_booking(BookingId::generate());
        self.bookings.insert(booking.id, booking.clone());
        debug!(booking_id = %booking.id, status = %booking.status, "Booking inserted");

        Ok(booking)
    }

    async fn update(&self, id: BookingId, patch: BookingPatch) -> Result<Booking, StoreError> {
        self.check_write()?;

        let updated = {
            let mut entry = self
                .bookings
                .get_mut(&id)
                .ok_or(StoreError::NotFound { booking_id: id })?;
            patch.apply_to(&mut entry);
            entry.clone()
        };
        debug!(booking_id = %id, status = %updated.status, "Booking updated");

        self.publish(&updated);
        Ok(updated)
    }

    async fn get(&self, id: BookingId) -> Result<Booking, StoreError> {
        self.check_online()?;

        self.bookings
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or(StoreError::NotFound { booking_id: id })
    }

    async fn list_by_user(&self, user: &UserId) -> Result<Vec<Booking>, StoreError> {
        self.check_online()?;

        let mut bookings: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|entry| &entry.user_id == user)
            .map(|entry| entry.clone())
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(bookings)
    }

    async fn subscribe(&self, id: BookingId) -> Result<Subscription, StoreError> {
        self.check_online()?;
        if !self.bookings.contains_key(&id) {
            return Err(StoreError::NotFound { booking_id: id });
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let subscriber_id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers.entry(id).or_default().push(Subscriber {
            id: subscriber_id,
            sender,
        });

        let subscribers = Arc::downgrade(&self.subscribers);
        Ok(Subscription::new(id, receiver, move || {
            release_subscriber(&subscribers, id, subscriber_id);
        }))
    }

    async fn current_user(&self) -> Option<UserId> {
        self.user.lock().expect("user lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::booking::{BookingStatus, ServiceTier};
    use crate::geo::Location;
    use crate::pricing::PricingQuote;

    fn new_booking(user: &str) -> NewBooking {
        NewBooking {
            user_id: UserId::from(user),
            pickup: Arc::new(Location::new(12.9716, 77.5946, "MG Road")),
            destination: Arc::new(Location::new(12.9352, 77.6146, "Koramangala")),
            tier: ServiceTier::Economy,
            quote: PricingQuote::default(),
            status: BookingStatus::Confirmed,
            estimated_duration_min: 23.0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::new();

        let booking = store.insert(new_booking("rider")).await.unwrap();
        let fetched = store.get(booking.id).await.unwrap();

        assert_eq!(fetched, booking);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_insert_leaves_nothing() {
        let store = MemoryStore::new();
        store.fail_next_writes(1);

        let result = store.insert(new_booking("rider")).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.is_empty());

        // Only the one write was rigged to fail
        assert!(store.insert(new_booking("rider")).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_missing_booking() {
        let store = MemoryStore::new();
        let id = BookingId::generate();

        let result = store
            .update(id, BookingPatch::status(BookingStatus::Cancelled))
            .await;

        assert_eq!(result.unwrap_err(), StoreError::NotFound { booking_id: id });
    }

    #[tokio::test]
    async fn test_subscribers_receive_full_records() {
        let store = MemoryStore::new();
        let booking = store.insert(new_booking("rider")).await.unwrap();
        let mut subscription = store.subscribe(booking.id).await.unwrap();

        store
            .update(booking.id, BookingPatch::status(BookingStatus::InTransit))
            .await
            .unwrap();

        let pushed = subscription.recv().await.unwrap();
        assert_eq!(pushed.id, booking.id);
        assert_eq!(pushed.status, BookingStatus::InTransit);
        assert_eq!(pushed.pickup, booking.pickup);
    }

    #[tokio::test]
    async fn test_unsubscribe_releases_channel() {
        let store = MemoryStore::new();
        let booking = store.insert(new_booking("rider")).await.unwrap();

        let first = store.subscribe(booking.id).await.unwrap();
        let second = store.subscribe(booking.id).await.unwrap();
        assert_eq!(store.subscriber_count(booking.id), 2);

        first.unsubscribe();
        assert_eq!(store.subscriber_count(booking.id), 1);

        drop(second);
        assert_eq!(store.subscriber_count(booking.id), 0);
    }

    #[tokio::test]
    async fn test_list_by_user_newest_first() {
        let store = MemoryStore::new();
        let mut older = new_booking("ana");
        older.created_at = Utc::now() - chrono::Duration::minutes(5);

        let older = store.insert(older).await.unwrap();
        let newer = store.insert(new_booking("ana")).await.unwrap();
        store.insert(new_booking("ben")).await.unwrap();

        let history = store.list_by_user(&UserId::from("ana")).await.unwrap();
        let ids: Vec<_> = history.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn test_offline_store() {
        let store = MemoryStore::with_user("rider");
        let booking = store.insert(new_booking("rider")).await.unwrap();
        store.set_offline(true);

        assert!(matches!(store.get(booking.id).await, Err(StoreError::Unavailable(_))));
        assert!(store.subscribe(booking.id).await.is_err());
        assert_eq!(store.current_user().await, Some(UserId::from("rider")));
    }
}
