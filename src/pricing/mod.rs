//! Fare quotes.
//!
//! A quote is a pure function of the two locations, the service tier, the local wall-clock time
//! and the [`PricingProfile`] in force:
//!
//! ```text
//! final_price = base_fare + distance_km * rate_per_km(tier) * route_complexity * surge
//! ```
//!
//! Profiles with `whole_rupees` set round the distance part before the base fare is added.
//!
//! Nothing here reads the system clock; callers pass `now` in (usually from a
//! [`Clock`](crate::clock::Clock)).

pub mod profile;

use chrono::{NaiveDateTime, Timelike};

use crate::booking::ServiceTier;
use crate::geo::{self, Location};

pub use self::profile::{
    ComplexityBand, ComplexityTable, PeakWindow, PricingProfile, SurgeSchedule, TierParams,
};

/// A priced, time-stamped fare estimate for one pickup/destination/tier combination.
///
/// Quotes are values: when any input changes a new quote replaces the old one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PricingQuote {
    pub base_distance_km: f64,
    pub route_complexity: f64,
    pub surge_multiplier: f64,
    pub base_fare: f64,
    pub final_price: f64,
    pub estimated_duration_min: f64,
    pub quoted_at: NaiveDateTime,
}

impl PricingProfile {
    /// Price a trip from `pickup` to `destination` at local time `now`.
    pub fn quote(
        &self,
        pickup: &Location,
        destination: &Location,
        tier: ServiceTier,
        now: NaiveDateTime,
    ) -> PricingQuote {
        let base_distance_km = geo::distance_km(pickup, destination);
        let route_complexity = self.complexity.factor_for(base_distance_km);
        let surge_multiplier = self.surge.multiplier_at(now.hour());
        let params = self.tier(tier);

        let mut distance_fare =
            base_distance_km * params.rate_per_km * route_complexity * surge_multiplier;
        if self.whole_rupees {
            distance_fare = distance_fare.round();
        }
        let final_price = self.base_fare + distance_fare;

        PricingQuote {
            base_distance_km,
            route_complexity,
            surge_multiplier,
            base_fare: self.base_fare,
            final_price,
            estimated_duration_min: self.estimated_duration_min(base_distance_km, tier),
            quoted_at: now,
        }
    }

    /// Whole flight minutes for `distance_km` at the tier's cruise speed.
    pub fn estimated_duration_min(&self, distance_km: f64, tier: ServiceTier) -> f64 {
        (distance_km / self.tier(tier).speed_factor * self.minutes_per_km).ceil()
    }
}

/// Price a trip under the default ([`standard`](PricingProfile::standard)) profile.
pub fn quote(
    pickup: &Location,
    destination: &Location,
    tier: ServiceTier,
    now: NaiveDateTime,
) -> PricingQuote {
    PricingProfile::default().quote(pickup, destination, tier, now)
}
