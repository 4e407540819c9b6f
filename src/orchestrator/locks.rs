use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::booking::BookingId;

/// One async lock per booking, held from reading a booking's status until the new status has been
/// written, so two status changes on the same booking never interleave.
#[derive(Debug, Default)]
pub(crate) struct BookingLocks {
    locks: DashMap<BookingId, Arc<Mutex<()>>, ahash::RandomState>,
}

impl BookingLocks {
    pub(crate) async fn acquire(&self, id: BookingId) -> OwnedMutexGuard<()> {
        // The map entry must not be held across the await
        let lock = Arc::clone(&self.locks.entry(id).or_default());
        lock.lock_owned().await
    }

    /// Release `guard` and drop the lock of a booking that reached a terminal status.
    ///
    /// The entry stays if anyone else holds a reference, since they are queued on it.
    pub(crate) fn retire(&self, id: BookingId, guard: OwnedMutexGuard<()>) {
        // One reference in the map, one in `guard`
        self.locks.remove_if(&id, |_, lock| Arc::strong_count(lock) == 2);
        drop(guard);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}
