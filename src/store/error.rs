//! Error types for the booking store contract.

use crate::booking::BookingId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No booking exists under the requested id.
    #[error("booking {booking_id} not found")]
    NotFound { booking_id: BookingId },

    /// The store could not be reached or refused the operation. Nothing was written.
    #[error("booking store unavailable: {0}")]
    Unavailable(String),
}
