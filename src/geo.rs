//! Great-circle geometry over WGS84 latitude/longitude pairs.

use std::fmt;
use std::sync::Arc;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A bare latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// A named point a trip can start or end at.
///
/// Locations are immutable once attached to a booking request; the address is shared rather than
/// copied when a booking is cloned.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub address: Arc<str>,
}

impl Location {
    pub fn new(lat: f64, lng: f64, address: impl Into<Arc<str>>) -> Self {
        Self {
            lat,
            lng,
            address: address.into(),
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

impl From<&Location> for Coordinate {
    fn from(location: &Location) -> Self {
        location.coordinate()
    }
}

/// Haversine distance between `a` and `b` in kilometers.
///
/// Symmetric, zero for identical points and non-negative for any finite input.
pub fn distance_km(a: impl Into<Coordinate>, b: impl Into<Coordinate>) -> f64 {
    let a = a.into();
    let b = b.into();

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    // Rounding can push `h` a hair past 1.0 for antipodal points.
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}
