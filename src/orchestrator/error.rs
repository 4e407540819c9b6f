use thiserror::Error;

use crate::booking::BookingId;
use crate::booking::error::ValidationError;
use crate::state_machine::error::InvalidTransition;
use crate::store::StoreError;

/// Errors surfaced to callers of the booking orchestrator.
///
/// Pricing and distance never fail, so everything here originates at request validation, the
/// lifecycle guard, or the store boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BookingError {
    /// The request was incomplete and was not priced.
    #[error("invalid booking request: {0}")]
    Validation(#[from] ValidationError),

    /// Nobody is signed in. Nothing was written.
    #[error("sign in to book a trip")]
    NotAuthenticated,

    /// The booking does not exist in the store.
    #[error("booking {booking_id} not found")]
    NotFound { booking_id: BookingId },

    /// The store failed. The booking is uncommitted (on create) or unchanged (otherwise).
    #[error("booking store error")]
    Persistence(#[source] StoreError),

    /// The lifecycle does not allow the requested change.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl From<StoreError> for BookingError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { booking_id } => BookingError::NotFound { booking_id },
            other => BookingError::Persistence(other),
        }
    }
}
