//! The contract between the booking core and its persistence/auth/realtime backend.
//!
//! The core never assumes a transport. It needs create/read/update of booking records, a
//! per-booking change feed, and the identity of the signed-in user. Change events carry the whole
//! record, so delivering one twice is harmless.

pub mod error;
pub mod memory;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;

use crate::booking::{Booking, BookingId, BookingPatch, NewBooking};
use crate::user::UserId;

pub use self::error::StoreError;
pub use self::memory::MemoryStore;

pub trait BookingStore: Send + Sync + 'static {
    /// Persist a new booking. Either the whole record is committed and returned with its assigned
    /// id, or nothing is visible to other readers.
    fn insert(
        &self,
        booking: NewBooking,
    ) -> impl Future<Output = Result<Booking, StoreError>> + Send;

    /// Apply `patch` to the booking and return the updated record.
    fn update(
        &self,
        id: BookingId,
        patch: BookingPatch,
    ) -> impl Future<Output = Result<Booking, StoreError>> + Send;

    fn get(&self, id: BookingId) -> impl Future<Output = Result<Booking, StoreError>> + Send;

    /// Every booking made by `user`, newest first.
    fn list_by_user(
        &self,
        user: &UserId,
    ) -> impl Future<Output = Result<Vec<Booking>, StoreError>> + Send;

    /// Open a change feed for one booking.
    fn subscribe(
        &self,
        id: BookingId,
    ) -> impl Future<Output = Result<Subscription, StoreError>> + Send;

    /// The signed-in user, if any.
    fn current_user(&self) -> impl Future<Output = Option<UserId>> + Send;
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// A live change feed for a single booking.
///
/// Each item is the full updated record. The feed is released back to the store when the
/// subscription is [unsubscribed](Self::unsubscribe) or dropped.
pub struct Subscription {
    booking_id: BookingId,
    receiver: mpsc::UnboundedReceiver<Booking>,
    release: Option<ReleaseFn>,
}

impl Subscription {
    /// Wrap a channel receiver; `release` runs exactly once when the subscription ends.
    pub fn new(
        booking_id: BookingId,
        receiver: mpsc::UnboundedReceiver<Booking>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            booking_id,
            receiver,
            release: Some(Box::new(release)),
        }
    }

    pub fn booking_id(&self) -> BookingId {
        self.booking_id
    }

    /// The next pushed record, or `None` once the store closes the feed.
    pub async fn recv(&mut self) -> Option<Booking> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.receiver.close();
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("booking_id", &self.booking_id)
            .field("released", &self.release.is_none())
            .finish()
    }
}

impl futures::Stream for Subscription {
    type Item = Booking;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
