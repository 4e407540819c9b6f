//! Error types for trip registry management.

use crate::booking::BookingId;

/// Indicates that no simulator is currently bound to the booking.
#[derive(Debug, thiserror::Error)]
#[error("no active trip for booking {booking_id}")]
pub struct TripNotFound {
    pub booking_id: BookingId,
}
