use std::fmt;

use dashmap::DashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::error::TripNotFound;
use crate::booking::BookingId;

/// Identifies one run of a simulator. A booking that is re-attached gets a fresh session.
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct TripSessionId(Uuid);

impl TripSessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Debug for TripSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TripSessionId({})", self.0)
    }
}

impl fmt::Display for TripSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct ActiveTrip {
    session_id: TripSessionId,
    cancel: oneshot::Sender<()>,
}

impl ActiveTrip {
    fn cancel(self) -> TripSessionId {
        // The runner may already be gone; either way it will not tick again.
        let _ = self.cancel.send(());
        self.session_id
    }
}

/// A freshly registered trip.
#[derive(Debug)]
pub struct Registration {
    pub session_id: TripSessionId,
    /// Resolves when the trip is cancelled or its registration is released.
    pub cancelled: oneshot::Receiver<()>,
    /// The session that was bound to the booking before, now cancelled.
    pub replaced: Option<TripSessionId>,
}

/// The set of running simulators, at most one per booking.
#[derive(Debug)]
pub struct TripRegistry {
    trips: DashMap<BookingId, ActiveTrip, ahash::RandomState>,
}

impl TripRegistry {
    pub fn new() -> Self {
        Self {
            trips: DashMap::default(),
        }
    }

    /// Bind a new session to `booking_id`, cancelling whichever session held it before.
    pub fn register(&self, booking_id: BookingId) -> Registration {
        let (cancel, cancelled) = oneshot::channel();
        let session_id = TripSessionId::generate();

        let replaced = self
            .trips
            .insert(booking_id, ActiveTrip { session_id, cancel })
            .map(ActiveTrip::cancel);

        Registration {
            session_id,
            cancelled,
            replaced,
        }
    }

    /// Cancel and forget the session bound to `booking_id`, whatever it is.
    pub fn cancel(&self, booking_id: BookingId) -> Result<TripSessionId, TripNotFound> {
        self.trips
            .remove(&booking_id)
            .map(|(_, trip)| trip.cancel())
            .ok_or(TripNotFound { booking_id })
    }

    /// Cancel and forget `session_id` if it is still the one bound to `booking_id`.
    ///
    /// Returns whether anything was released. A stale session never evicts its replacement.
    pub fn release(&self, booking_id: BookingId, session_id: TripSessionId) -> bool {
        self.trips
            .remove_if(&booking_id, |_, trip| trip.session_id == session_id)
            .map(|(_, trip)| trip.cancel())
            .is_some()
    }

    pub fn is_active(&self, booking_id: BookingId) -> bool {
        self.trips.contains_key(&booking_id)
    }

    pub fn session_id(&self, booking_id: BookingId) -> Option<TripSessionId> {
        self.trips.get(&booking_id).map(|trip| trip.session_id)
    }

    pub fn active_count(&self) -> usize {
        self.trips.len()
    }
}

impl Default for TripRegistry {
    fn default() -> Self {
        Self::new()
    }
}
