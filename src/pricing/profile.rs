use bon::Builder;

use crate::booking::ServiceTier;

/// One band of the route complexity table: trips shorter than `below_km` use `factor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexityBand {
    pub below_km: f64,
    pub factor: f64,
}

/// A step function from trip distance to route complexity.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexityTable {
    bands: Vec<ComplexityBand>,
    beyond: f64,
}

impl ComplexityTable {
    /// Build a table from `(below_km, factor)` bands and the factor used past the last band.
    ///
    /// Bands are kept sorted by their upper bound regardless of the order given.
    pub fn new(bands: impl IntoIterator<Item = (f64, f64)>, beyond: f64) -> Self {
        let mut bands: Vec<_> = bands
            .into_iter()
            .map(|(below_km, factor)| ComplexityBand { below_km, factor })
            .collect();
        bands.sort_by(|a, b| a.below_km.total_cmp(&b.below_km));
        Self { bands, beyond }
    }

    pub fn factor_for(&self, distance_km: f64) -> f64 {
        self.bands
            .iter()
            .find(|band| distance_km < band.below_km)
            .map_or(self.beyond, |band| band.factor)
    }

    pub fn bands(&self) -> &[ComplexityBand] {
        &self.bands
    }
}

/// An inclusive range of local hours during which surge applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakWindow {
    pub first_hour: u32,
    pub last_hour: u32,
}

impl PeakWindow {
    pub const fn new(first_hour: u32, last_hour: u32) -> Self {
        Self {
            first_hour,
            last_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        (self.first_hour..=self.last_hour).contains(&hour)
    }
}

/// Time-of-day surge pricing.
#[derive(Debug, Clone, PartialEq)]
pub struct SurgeSchedule {
    pub windows: Vec<PeakWindow>,
    pub multiplier: f64,
}

impl SurgeSchedule {
    /// A schedule that never surges.
    pub fn none() -> Self {
        Self {
            windows: Vec::new(),
            multiplier: 1.0,
        }
    }

    pub fn multiplier_at(&self, hour: u32) -> f64 {
        if self.windows.iter().any(|window| window.contains(hour)) {
            self.multiplier
        } else {
            1.0
        }
    }
}

impl Default for SurgeSchedule {
    /// Morning 08:00-11:59 and evening 17:00-20:59 peaks at 1.5x.
    fn default() -> Self {
        Self {
            windows: vec![PeakWindow::new(8, 11), PeakWindow::new(17, 20)],
            multiplier: 1.5,
        }
    }
}

/// Per-tier pricing and speed parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierParams {
    pub rate_per_km: f64,
    /// Relative cruise speed; higher is faster.
    pub speed_factor: f64,
}

/// A complete, named fare formula.
///
/// Three formulas are in use. [`standard`](Self::standard) is what bookings are priced with;
/// [`graduated`](Self::graduated) swaps in a finer four-band complexity table; and
/// [`flat_fare`](Self::flat_fare) is the skyport-to-skyport tariff of a fixed per-km rate plus a
/// base fare. Anything else can be assembled with the builder.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct PricingProfile {
    #[builder(into, default = "custom".to_string())]
    pub name: String,

    #[builder(default = ComplexityTable::new([(5.0, 1.0), (15.0, 1.2)], 1.4))]
    pub complexity: ComplexityTable,

    #[builder(default)]
    pub surge: SurgeSchedule,

    #[builder(default = TierParams { rate_per_km: 50.0, speed_factor: 1.0 })]
    pub economy: TierParams,

    #[builder(default = TierParams { rate_per_km: 80.0, speed_factor: 1.3 })]
    pub premium: TierParams,

    /// Flat amount added to every fare.
    #[builder(default = 0.0)]
    pub base_fare: f64,

    /// Round the distance part of the fare to whole rupees before adding the base fare.
    #[builder(default)]
    pub whole_rupees: bool,

    /// Flight minutes per km at a speed factor of 1.0.
    #[builder(default = 5.0)]
    pub minutes_per_km: f64,
}

impl PricingProfile {
    pub const STANDARD: &'static str = "standard";
    pub const GRADUATED: &'static str = "graduated";
    pub const FLAT_FARE: &'static str = "flat_fare";

    /// Bands <5 km 1.0, <15 km 1.2, beyond 1.4 at 50/80 per km with surge. No base fare.
    pub fn standard() -> Self {
        Self::builder().name(Self::STANDARD).build()
    }

    /// As [`standard`](Self::standard) with bands <5 km 1.0, <10 km 1.1, <20 km 1.2, beyond 1.3.
    pub fn graduated() -> Self {
        Self::builder()
            .name(Self::GRADUATED)
            .complexity(ComplexityTable::new([(5.0, 1.0), (10.0, 1.1), (20.0, 1.2)], 1.3))
            .build()
    }

    /// 180 per km for every tier, rounded to whole rupees, plus 250. No complexity, no surge.
    pub fn flat_fare() -> Self {
        let per_km = |speed_factor| TierParams {
            rate_per_km: 180.0,
            speed_factor,
        };

        Self::builder()
            .name(Self::FLAT_FARE)
            .complexity(ComplexityTable::new([], 1.0))
            .surge(SurgeSchedule::none())
            .economy(per_km(1.0))
            .premium(per_km(1.3))
            .base_fare(250.0)
            .whole_rupees(true)
            .build()
    }

    /// Look up one of the built-in profiles by name.
    pub fn named(name: &str) -> Option<Self> {
        match name {
            Self::STANDARD => Some(Self::standard()),
            Self::GRADUATED => Some(Self::graduated()),
            Self::FLAT_FARE => Some(Self::flat_fare()),
            _ => None,
        }
    }

    pub fn tier(&self, tier: ServiceTier) -> &TierParams {
        match tier {
            ServiceTier::Economy => &self.economy,
            ServiceTier::Premium => &self.premium,
        }
    }
}

impl Default for PricingProfile {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graduated_breakpoints() {
        let table = PricingProfile::graduated().complexity;
        assert_eq!(table.factor_for(0.0), 1.0);
        assert_eq!(table.factor_for(4.99), 1.0);
        assert_eq!(table.factor_for(5.0), 1.1);
        assert_eq!(table.factor_for(12.0), 1.2);
        assert_eq!(table.factor_for(20.0), 1.3);
    }

    #[test]
    fn test_standard_breakpoints() {
        let profile = PricingProfile::default();
        assert_eq!(profile.name, PricingProfile::STANDARD);
        assert_eq!(profile.complexity.factor_for(4.99), 1.0);
        assert_eq!(profile.complexity.factor_for(14.9), 1.2);
        assert_eq!(profile.complexity.factor_for(15.0), 1.4);
        assert_eq!(profile.base_fare, 0.0);
    }

    #[test]
    fn test_flat_fare_ignores_distance_bands_and_hour() {
        let profile = PricingProfile::flat_fare();
        assert_eq!(profile.complexity.factor_for(0.0), 1.0);
        assert_eq!(profile.complexity.factor_for(80.0), 1.0);
        assert_eq!(profile.surge.multiplier_at(9), 1.0);
        assert_eq!(profile.economy.rate_per_km, profile.premium.rate_per_km);
        assert_eq!(profile.base_fare, 250.0);
    }

    #[test]
    fn test_bands_sorted_on_construction() {
        let table = ComplexityTable::new([(20.0, 1.2), (5.0, 1.0)], 1.3);
        assert_eq!(table.bands()[0].below_km, 5.0);
        assert_eq!(table.factor_for(7.0), 1.2);
    }

    #[test]
    fn test_surge_windows_inclusive() {
        let surge = SurgeSchedule::default();
        assert_eq!(surge.multiplier_at(7), 1.0);
        assert_eq!(surge.multiplier_at(8), 1.5);
        assert_eq!(surge.multiplier_at(11), 1.5);
        assert_eq!(surge.multiplier_at(12), 1.0);
        assert_eq!(surge.multiplier_at(20), 1.5);
        assert_eq!(surge.multiplier_at(21), 1.0);
    }

    #[test]
    fn test_named_profiles() {
        assert_eq!(PricingProfile::named("standard"), Some(PricingProfile::standard()));
        assert_eq!(PricingProfile::named("graduated"), Some(PricingProfile::graduated()));
        assert_eq!(PricingProfile::named("flat_fare"), Some(PricingProfile::flat_fare()));
        assert_eq!(PricingProfile::named("surge_only"), None);
    }

    #[test]
    fn test_premium_rate_ratio() {
        let profile = PricingProfile::default();
        let ratio = profile.premium.rate_per_km / profile.economy.rate_per_km;
        assert!((ratio - 1.6).abs() < 1e-9);
    }
}
