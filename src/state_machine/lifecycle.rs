//! Booking lifecycle.
//!
//! ```text
//! pending ──Persisted──▶ confirmed ──TransitStarted──▶ in_transit ──Arrived──▶ completed
//!    │                       │
//!    └────────Cancel─────────┴──────────▶ cancelled
//! ```
//!
//! `completed` and `cancelled` are terminal. Nothing re-enters `pending` or `confirmed`, and a trip
//! that is in the air can no longer be cancelled.

use std::collections::VecDeque;
use std::fmt;

use crate::booking::BookingStatus;

use super::StateMachine;
use super::error::InvalidTransition;

/// Something that happened to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The booking was written to the store.
    Persisted,
    /// A vehicle was assigned and started moving.
    TransitStarted,
    /// The simulator detected arrival at the destination.
    Arrived,
    /// A rider or operator called the trip off.
    Cancel,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleEvent::Persisted => "persisted",
            LifecycleEvent::TransitStarted => "transit-started",
            LifecycleEvent::Arrived => "arrived",
            LifecycleEvent::Cancel => "cancel",
        })
    }
}

impl BookingStatus {
    /// The status reached by applying `event`, or [`InvalidTransition`] if `event` is not allowed
    /// from this status.
    pub fn apply(self, event: LifecycleEvent) -> Result<BookingStatus, InvalidTransition> {
        use BookingStatus::*;
        use LifecycleEvent::*;

        match (self, event) {
            (Pending, Persisted) => Ok(Confirmed),
            (Confirmed, TransitStarted) => Ok(InTransit),
            (InTransit, Arrived) => Ok(Completed),
            (Pending | Confirmed, Cancel) => Ok(Cancelled),
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }

    /// Whether the lifecycle can move from this status to `next` in zero or more steps.
    ///
    /// Used to decide whether a status pushed by the store is ahead of what we hold locally.
    pub fn can_reach(self, next: BookingStatus) -> bool {
        use BookingStatus::*;

        match (self, next) {
            (a, b) if a == b => true,
            (Pending, _) => true,
            (Confirmed, InTransit | Completed | Cancelled) => true,
            (InTransit, Completed) => true,
            _ => false,
        }
    }
}

/// Outcome of feeding an event to a [`LifecycleMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutput {
    Changed {
        from: BookingStatus,
        to: BookingStatus,
    },
    Rejected(InvalidTransition),
}

/// Tracks the status of a single booking.
#[derive(Debug)]
pub struct LifecycleMachine {
    status: BookingStatus,
    pending: VecDeque<LifecycleOutput>,
}

impl LifecycleMachine {
    pub fn new() -> Self {
        Self::resume(BookingStatus::Pending)
    }

    /// Pick up a booking whose status is already known, e.g. one read back from the store.
    pub fn resume(status: BookingStatus) -> Self {
        Self {
            status,
            pending: VecDeque::new(),
        }
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    /// Apply `event` immediately, returning the new status.
    pub fn transition(
        &mut self,
        event: LifecycleEvent,
    ) -> Result<BookingStatus, InvalidTransition> {
        let next = self.status.apply(event)?;
        self.status = next;
        Ok(next)
    }

    fn handle_event(&mut self, event: LifecycleEvent) {
        let from = self.status;
        let output = match self.transition(event) {
            Ok(to) => LifecycleOutput::Changed { from, to },
            Err(rejected) => LifecycleOutput::Rejected(rejected),
        };
        self.pending.push_back(output);
    }
}

impl Default for LifecycleMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine for LifecycleMachine {
    type Input = LifecycleEvent;
    type Output = LifecycleOutput;

    fn process_input(&mut self, input: Self::Input) {
        self.handle_event(input);
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.pending.pop_front()
    }
}
