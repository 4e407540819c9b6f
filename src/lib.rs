pub mod booking;
pub mod clock;
pub mod geo;
pub mod orchestrator;
pub mod pricing;
pub mod skyport;
pub mod state_machine;
pub mod store;
pub mod trip;
pub mod user;

pub use booking::{Booking, BookingId, BookingRequest, BookingStatus, ServiceTier};
pub use geo::{Coordinate, Location};
pub use orchestrator::{BookingError, BookingOrchestrator, OrchestratorConfig};
pub use pricing::{PricingProfile, PricingQuote};
pub use store::{BookingStore, MemoryStore};
pub use trip::{SimulatorConfig, TripHandle, TripOutcome, TripProgress};
pub use user::UserId;

/// Service tier used by the binaries when `SKYLIFT_TIER` is unset.
pub const DEFAULT_TIER: ServiceTier = ServiceTier::Economy;

/// Read `name` from the environment, falling back to `default` when unset.
///
/// A value that is set but does not parse is an error rather than silently ignored.
pub fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {name}={raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}
