//! The fixed set of places a trip can start or end at.

use std::fmt;
use std::sync::Arc;

use crate::geo::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkyportKind {
    Hub,
    Rooftop,
    Helipad,
}

impl fmt::Display for SkyportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkyportKind::Hub => "hub",
            SkyportKind::Rooftop => "rooftop",
            SkyportKind::Helipad => "helipad",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skyport {
    pub id: Arc<str>,
    pub name: Arc<str>,
    pub location: Location,
    /// Vehicles that can be parked at once.
    pub capacity: u32,
    pub kind: SkyportKind,
}

impl Skyport {
    pub fn new(
        id: impl Into<Arc<str>>,
        name: impl Into<Arc<str>>,
        location: Location,
        capacity: u32,
        kind: SkyportKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location,
            capacity,
            kind,
        }
    }
}

/// Lookup over the bookable skyports.
#[derive(Debug, Clone, Default)]
pub struct SkyportDirectory {
    ports: Vec<Skyport>,
}

impl SkyportDirectory {
    pub fn new(ports: impl IntoIterator<Item = Skyport>) -> Self {
        Self {
            ports: ports.into_iter().collect(),
        }
    }

    /// The launch network around Bangalore.
    pub fn bangalore() -> Self {
        let port = |id: &str, name: &str, lat, lng, capacity, kind| {
            Skyport::new(id, name, Location::new(lat, lng, name), capacity, kind)
        };

        Self::new([
            port("mg-road", "MG Road", 12.9716, 77.5946, 6, SkyportKind::Hub),
            port("koramangala", "Koramangala", 12.9352, 77.6146, 4, SkyportKind::Rooftop),
            port("whitefield", "Whitefield", 12.9698, 77.7500, 4, SkyportKind::Rooftop),
            port("electronic-city", "Electronic City", 12.8452, 77.6602, 3, SkyportKind::Helipad),
            port("hebbal", "Hebbal", 13.0358, 77.5970, 3, SkyportKind::Helipad),
            port("kia", "Kempegowda Airport", 13.1986, 77.7066, 10, SkyportKind::Hub),
        ])
    }

    pub fn get(&self, id: &str) -> Option<&Skyport> {
        self.ports.iter().find(|port| &*port.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Skyport> {
        self.ports.iter()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}
