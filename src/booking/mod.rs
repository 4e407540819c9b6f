pub mod error;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::geo::Location;
use crate::pricing::PricingQuote;
use crate::user::UserId;

use self::error::ValidationError;

/// Store-assigned identifier of a booking.
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct BookingId(Uuid);

impl BookingId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for BookingId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Debug for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BookingId({})", self.0)
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The service class a rider books, selecting the per-km rate and the cruise speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceTier {
    Economy,
    Premium,
}

impl ServiceTier {
    pub const ALL: [ServiceTier; 2] = [ServiceTier::Economy, ServiceTier::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceTier::Economy => "economy",
            ServiceTier::Premium => "premium",
        }
    }

    /// The product name shown to riders.
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceTier::Economy => "SkyPod",
            ServiceTier::Premium => "AeroLuxe",
        }
    }
}

impl fmt::Display for ServiceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown tier or status name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for ServiceTier {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "economy" | "skypod" => Ok(ServiceTier::Economy),
            "premium" | "aeroluxe" => Ok(ServiceTier::Premium),
            _ => Err(UnknownVariant {
                kind: "service tier",
                value: s.to_string(),
            }),
        }
    }
}

/// Lifecycle state of a booking. See [`crate::state_machine::lifecycle`] for the transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InTransit,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InTransit => "in_transit",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// `completed` and `cancelled` admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "in_transit" => Ok(BookingStatus::InTransit),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            _ => Err(UnknownVariant {
                kind: "booking status",
                value: s.to_string(),
            }),
        }
    }
}

/// A persisted trip booking.
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub pickup: Arc<Location>,
    pub destination: Arc<Location>,
    pub tier: ServiceTier,
    pub quote: PricingQuote,
    pub status: BookingStatus,
    pub estimated_duration_min: f64,
    pub created_at: DateTime<Utc>,
}

/// A booking record ready for insertion; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub user_id: UserId,
    pub pickup: Arc<Location>,
    pub destination: Arc<Location>,
    pub tier: ServiceTier,
    pub quote: PricingQuote,
    pub status: BookingStatus,
    pub estimated_duration_min: f64,
    pub created_at: DateTime<Utc>,
}

impl NewBooking {
    pub fn into_booking(self, id: BookingId) -> Booking {
        Booking {
            id,
            user_id: self.user_id,
            pickup: self.pickup,
            destination: self.destination,
            tier: self.tier,
            quote: self.quote,
            status: self.status,
            estimated_duration_min: self.estimated_duration_min,
            created_at: self.created_at,
        }
    }
}

/// A partial update of a persisted booking. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub estimated_duration_min: Option<f64>,
}

impl BookingPatch {
    pub fn status(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, booking: &mut Booking) {
        if let Some(status) = self.status {
            booking.status = status;
        }
        if let Some(duration) = self.estimated_duration_min {
            booking.estimated_duration_min = duration;
        }
    }
}

/// What a rider has selected so far. Any field may still be missing.
#[derive(Debug, Clone, Default)]
pub struct BookingRequest {
    pub pickup: Option<Location>,
    pub destination: Option<Location>,
    pub tier: Option<ServiceTier>,
}

/// A [`BookingRequest`] with every field present.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub pickup: Arc<Location>,
    pub destination: Arc<Location>,
    pub tier: ServiceTier,
}

impl BookingRequest {
    pub fn new(pickup: Location, destination: Location, tier: ServiceTier) -> Self {
        Self {
            pickup: Some(pickup),
            destination: Some(destination),
            tier: Some(tier),
        }
    }

    pub fn validate(self) -> Result<ValidatedRequest, ValidationError> {
        let pickup = self.pickup.ok_or(ValidationError::MissingPickup)?;
        let destination = self.destination.ok_or(ValidationError::MissingDestination)?;
        let tier = self.tier.ok_or(ValidationError::MissingTier)?;

        Ok(ValidatedRequest {
            pickup: Arc::new(pickup),
            destination: Arc::new(destination),
            tier,
        })
    }
}
