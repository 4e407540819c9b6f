//! Injected wall-clock time.
//!
//! Pricing depends on the local hour of day and bookings carry a creation timestamp. Neither may
//! read the system clock directly; they draw time from a [`Clock`] so that callers (and tests) can
//! pin it.

use chrono::{DateTime, Local, NaiveDateTime, Utc};

/// A source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// The current local wall-clock time, used for time-of-day decisions such as surge.
    fn local_now(&self) -> NaiveDateTime;
}

/// Reads the operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always reports the same instant. The local wall-clock time is taken to be the UTC time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// A clock pinned to `hour:00` on an arbitrary fixed day.
    ///
    /// Hours past 23 wrap around.
    pub fn at_hour(hour: u32) -> Self {
        let at = NaiveDateTime::default()
            + chrono::Duration::hours(i64::from(hour % 24));
        Self(at.and_utc())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }

    fn local_now(&self) -> NaiveDateTime {
        self.0.naive_utc()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn local_now(&self) -> NaiveDateTime {
        (**self).local_now()
    }
}
