//! Error types for booking lifecycle transitions.

use crate::booking::BookingStatus;

use super::lifecycle::LifecycleEvent;

/// A lifecycle event was applied to a status that does not accept it. The status is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {event} to a {from} booking")]
pub struct InvalidTransition {
    pub from: BookingStatus,
    pub event: LifecycleEvent,
}
