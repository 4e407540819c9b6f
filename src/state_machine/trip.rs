//! Tick-driven simulation of a vehicle flying from pickup to destination.
//!
//! Each tick moves the vehicle a fixed fraction of the way still to go, so the approach decays
//! geometrically and never lands exactly on the destination. Arrival is declared once the
//! per-axis gap measured at the start of a tick is under `arrival_epsilon_deg` on both axes.

use std::collections::VecDeque;

use crate::geo::{self, Coordinate};

use super::StateMachine;

/// Tuning of a simulated flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripSettings {
    /// Fraction of the remaining gap closed per tick.
    pub step_fraction: f64,
    /// Minutes taken off the ETA per tick.
    pub eta_step_min: f64,
    /// Per-axis gap, in degrees, under which the vehicle counts as arrived (~100 m).
    pub arrival_epsilon_deg: f64,
}

impl Default for TripSettings {
    fn default() -> Self {
        Self {
            step_fraction: 0.1,
            eta_step_min: 0.5,
            arrival_epsilon_deg: 0.001,
        }
    }
}

/// Snapshot of the simulated vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub position: Coordinate,
    pub eta_min: f64,
    pub remaining_km: f64,
    pub ticks: u32,
}

pub enum TripInput {
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TripOutput {
    Moved(VehicleState),
    Arrived(VehicleState),
}

pub struct TripMachine {
    position: Coordinate,
    destination: Coordinate,
    eta_min: f64,
    ticks: u32,
    arrived: bool,
    settings: TripSettings,
    pending: VecDeque<TripOutput>,
}

impl TripMachine {
    /// Start a flight at `start`.
    ///
    /// A flight that starts within the arrival threshold has nowhere to go: it is arrived from the
    /// outset and reports [`TripOutput::Arrived`] without ever needing a tick.
    pub fn new(
        start: Coordinate,
        destination: Coordinate,
        eta_min: f64,
        settings: TripSettings,
    ) -> Self {
        let mut machine = Self {
            position: start,
            destination,
            eta_min: eta_min.max(0.0),
            ticks: 0,
            arrived: false,
            settings,
            pending: VecDeque::new(),
        };

        if machine.within_threshold(machine.position) {
            machine.arrived = true;
            machine.eta_min = 0.0;
            machine.pending.push_back(TripOutput::Arrived(machine.state()));
        }

        machine
    }

    pub fn state(&self) -> VehicleState {
        VehicleState {
            position: self.position,
            eta_min: self.eta_min,
            remaining_km: geo::distance_km(self.position, self.destination),
            ticks: self.ticks,
        }
    }

    pub fn has_arrived(&self) -> bool {
        self.arrived
    }

    pub fn destination(&self) -> Coordinate {
        self.destination
    }

    /// Upper bound on the ticks this flight needs from its current position.
    ///
    /// After `n` moves the gap is `gap * (1 - step)^n`, and arrival is declared on the tick after
    /// the first move that takes it under epsilon: `floor(ln(gap / eps) / ln(1 / (1 - step))) + 2`.
    pub fn tick_bound(&self) -> u32 {
        if self.arrived {
            return 0;
        }

        let gap = (self.destination.lat - self.position.lat)
            .abs()
            .max((self.destination.lng - self.position.lng).abs());
        let per_tick = (1.0 / (1.0 - self.settings.step_fraction)).ln();
        let moves = (gap / self.settings.arrival_epsilon_deg).ln() / per_tick;

        moves.floor().max(0.0) as u32 + 2
    }

    fn within_threshold(&self, position: Coordinate) -> bool {
        let epsilon = self.settings.arrival_epsilon_deg;
        (self.destination.lat - position.lat).abs() < epsilon
            && (self.destination.lng - position.lng).abs() < epsilon
    }

    fn tick(&mut self) {
        if self.arrived {
            return;
        }

        let arrived = self.within_threshold(self.position);

        let lat_delta = self.destination.lat - self.position.lat;
        let lng_delta = self.destination.lng - self.position.lng;
        self.position.lat += lat_delta * self.settings.step_fraction;
        self.position.lng += lng_delta * self.settings.step_fraction;
        self.eta_min = (self.eta_min - self.settings.eta_step_min).max(0.0);
        self.ticks += 1;

        if arrived {
            self.arrived = true;
            self.pending.push_back(TripOutput::Arrived(self.state()));
        } else {
            self.pending.push_back(TripOutput::Moved(self.state()));
        }
    }
}

impl StateMachine for TripMachine {
    type Input = TripInput;
    type Output = TripOutput;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            TripInput::Tick => self.tick(),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.pending.pop_front()
    }
}
