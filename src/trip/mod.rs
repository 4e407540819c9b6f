//! Running trip simulators.
//!
//! Each attached booking gets one tokio task that owns its [`TripMachine`] outright. The task
//! ticks the machine on a fixed interval, publishes a [`TripProgress`] snapshot after every
//! tick, listens to the booking's change feed, and persists the completion when the vehicle
//! arrives. Callers observe it through a [`TripHandle`]; dropping the handle stops the trip.

pub mod error;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use futures::Stream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::booking::{Booking, BookingId, BookingPatch, BookingStatus};
use crate::geo::Coordinate;
use crate::state_machine::StateMachine;
use crate::state_machine::lifecycle::{LifecycleEvent, LifecycleMachine};
use crate::state_machine::trip::{TripInput, TripMachine, TripOutput, TripSettings, VehicleState};
use crate::store::{BookingStore, Subscription};

pub use self::registry::{Registration, TripRegistry, TripSessionId};

/// Configuration for trip simulators.
#[derive(Debug, Clone, Builder)]
pub struct SimulatorConfig {
    /// Wall-clock time between ticks.
    #[builder(default = Duration::from_secs(3))]
    pub tick_interval: Duration,

    #[builder(default)]
    pub settings: TripSettings,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The synthetic vehicle standing in for real telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedVehicle {
    pub booking_id: BookingId,
    pub position: Coordinate,
}

/// What an observer sees of a running trip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripProgress {
    pub vehicle: SimulatedVehicle,
    pub eta_min: f64,
    pub remaining_km: f64,
    pub ticks: u32,
    pub status: BookingStatus,
}

/// How a simulator stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripOutcome {
    /// The vehicle arrived and the completion was persisted.
    Completed,
    /// The vehicle arrived but the completion could not be persisted. The vehicle stays frozen at
    /// its last position and the stored booking is left as it was.
    Frozen,
    /// The store reported the booking completed before the vehicle got there.
    CompletedRemotely,
    /// The store reported the booking cancelled.
    Cancelled,
    /// The observer detached, the trip was replaced, or it was stopped by the orchestrator.
    Detached,
}

/// Observer side of a running simulator.
///
/// Dropping the handle detaches: the simulator is cancelled and no further tick fires.
pub struct TripHandle {
    booking_id: BookingId,
    session_id: TripSessionId,
    progress: watch::Receiver<TripProgress>,
    task: Option<JoinHandle<TripOutcome>>,
    registry: Arc<TripRegistry>,
}

impl TripHandle {
    pub fn booking_id(&self) -> BookingId {
        self.booking_id
    }

    pub fn session_id(&self) -> TripSessionId {
        self.session_id
    }

    /// The most recent snapshot.
    pub fn progress(&self) -> TripProgress {
        *self.progress.borrow()
    }

    /// A receiver that is notified on every new snapshot.
    pub fn watch(&self) -> watch::Receiver<TripProgress> {
        self.progress.clone()
    }

    /// Every snapshot from the current one until the simulator stops.
    ///
    /// Snapshots published faster than the stream is polled are coalesced to the latest.
    pub fn updates(&self) -> impl Stream<Item = TripProgress> + Send + 'static {
        let mut progress = self.progress.clone();
        async_stream::stream! {
            let current = *progress.borrow_and_update();
            yield current;
            while progress.changed().await.is_ok() {
                let current = *progress.borrow_and_update();
                yield current;
            }
        }
    }

    /// Wait for the simulator to stop.
    pub async fn finished(mut self) -> TripOutcome {
        let Some(task) = self.task.take() else {
            return TripOutcome::Detached;
        };

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(booking_id = %self.booking_id, error = %e, "Trip task failed");
                TripOutcome::Detached
            }
        }
    }

    /// Stop observing. Equivalent to dropping the handle.
    pub fn detach(self) {}
}

impl Drop for TripHandle {
    fn drop(&mut self) {
        if self.registry.release(self.booking_id, self.session_id) {
            debug!(booking_id = %self.booking_id, session_id = %self.session_id, "Trip detached");
        }
    }
}

/// Start a simulator for `booking`, which must already be in transit.
///
/// The vehicle starts at the pickup with the booking's estimated duration as its ETA. Any
/// simulator previously bound to the booking is cancelled first.
pub(crate) fn spawn<S: BookingStore>(
    store: Arc<S>,
    registry: Arc<TripRegistry>,
    booking: &Booking,
    feed: Option<Subscription>,
    config: &SimulatorConfig,
) -> TripHandle {
    let Registration {
        session_id,
        cancelled,
        replaced,
    } = registry.register(booking.id);

    if let Some(replaced) = replaced {
        info!(booking_id = %booking.id, replaced = %replaced, "Replaced running trip");
    }

    let machine = TripMachine::new(
        booking.pickup.coordinate(),
        booking.destination.coordinate(),
        booking.estimated_duration_min,
        config.settings,
    );
    let lifecycle = LifecycleMachine::resume(booking.status);

    let initial = progress_of(booking.id, machine.state(), lifecycle.status());
    let (progress_tx, progress_rx) = watch::channel(initial);

    let runner = TripRunner {
        booking_id: booking.id,
        session_id,
        store,
        registry: Arc::clone(&registry),
        machine,
        lifecycle,
        feed,
        cancelled,
        progress: progress_tx,
        tick_interval: config.tick_interval,
    };

    info!(
        booking_id = %booking.id,
        session_id = %session_id,
        eta_min = booking.estimated_duration_min,
        "Trip started"
    );

    TripHandle {
        booking_id: booking.id,
        session_id,
        progress: progress_rx,
        task: Some(tokio::spawn(runner.run())),
        registry,
    }
}

fn progress_of(booking_id: BookingId, state: VehicleState, status: BookingStatus) -> TripProgress {
    TripProgress {
        vehicle: SimulatedVehicle {
            booking_id,
            position: state.position,
        },
        eta_min: state.eta_min,
        remaining_km: state.remaining_km,
        ticks: state.ticks,
        status,
    }
}

/// Waits for the next pushed record; never resolves once the feed is gone.
async fn next_change(feed: &mut Option<Subscription>) -> Option<Booking> {
    match feed {
        Some(feed) => feed.recv().await,
        None => std::future::pending().await,
    }
}

struct TripRunner<S> {
    booking_id: BookingId,
    session_id: TripSessionId,
    store: Arc<S>,
    registry: Arc<TripRegistry>,
    machine: TripMachine,
    lifecycle: LifecycleMachine,
    feed: Option<Subscription>,
    cancelled: oneshot::Receiver<()>,
    progress: watch::Sender<TripProgress>,
    tick_interval: Duration,
}

impl<S: BookingStore> TripRunner<S> {
    async fn run(mut self) -> TripOutcome {
        let outcome = self.drive().await;

        self.registry.release(self.booking_id, self.session_id);
        info!(booking_id = %self.booking_id, outcome = ?outcome, "Trip stopped");

        outcome
    }

    async fn drive(&mut self) -> TripOutcome {
        // A trip that starts at its destination is done before the first tick.
        if let Some(outcome) = self.drain().await {
            return outcome;
        }

        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = &mut self.cancelled => {
                    return TripOutcome::Detached;
                }

                change = next_change(&mut self.feed) => {
                    match change {
                        Some(booking) => {
                            if let Some(outcome) = self.reconcile(booking) {
                                return outcome;
                            }
                        }
                        None => {
                            warn!(
                                booking_id = %self.booking_id,
                                "Change feed closed, continuing without it"
                            );
                            self.feed = None;
                        }
                    }
                }

                _ = ticker.tick() => {
                    self.machine.process_input(TripInput::Tick);
                    if let Some(outcome) = self.drain().await {
                        return outcome;
                    }
                }
            }
        }
    }

    /// Publish every pending machine output, finishing the trip on arrival.
    async fn drain(&mut self) -> Option<TripOutcome> {
        while let Some(output) = self.machine.poll_output() {
            match output {
                TripOutput::Moved(state) => {
                    debug!(
                        booking_id = %self.booking_id,
                        lat = state.position.lat,
                        lng = state.position.lng,
                        eta_min = state.eta_min,
                        "Vehicle moved"
                    );
                    self.publish(state);
                }
                TripOutput::Arrived(state) => {
                    self.publish(state);
                    return Some(self.complete(state).await);
                }
            }
        }
        None
    }

    async fn complete(&mut self, state: VehicleState) -> TripOutcome {
        let next = match self.lifecycle.status().apply(LifecycleEvent::Arrived) {
            Ok(next) => next,
            Err(e) => {
                warn!(booking_id = %self.booking_id, error = %e, "Arrived outside of transit");
                return TripOutcome::Frozen;
            }
        };

        match self
            .store
            .update(self.booking_id, BookingPatch::status(next))
            .await
        {
            Ok(_) => {
                self.lifecycle = LifecycleMachine::resume(next);
                self.publish(state);
                info!(booking_id = %self.booking_id, ticks = state.ticks, "Trip completed");
                TripOutcome::Completed
            }
            Err(e) => {
                warn!(
                    booking_id = %self.booking_id,
                    error = %e,
                    "Could not persist completion, vehicle frozen"
                );
                TripOutcome::Frozen
            }
        }
    }

    /// Fold a record pushed by the store into local state.
    ///
    /// A terminal status from the store always stops the trip, even one the local lifecycle
    /// could not have reached. Non-terminal statuses behind ours are stale echoes and ignored.
    fn reconcile(&mut self, booking: Booking) -> Option<TripOutcome> {
        let local = self.lifecycle.status();
        let remote = booking.status;

        if remote == local {
            return None;
        }
        if !remote.is_terminal() && !local.can_reach(remote) {
            debug!(
                booking_id = %self.booking_id,
                local = %local,
                remote = %remote,
                "Ignoring stale status from store"
            );
            return None;
        }

        info!(
            booking_id = %self.booking_id,
            local = %local,
            remote = %remote,
            "Store status adopted"
        );
        self.lifecycle = LifecycleMachine::resume(remote);
        self.publish(self.machine.state());

        match remote {
            BookingStatus::Completed => Some(TripOutcome::CompletedRemotely),
            BookingStatus::Cancelled => Some(TripOutcome::Cancelled),
            _ => None,
        }
    }

    fn publish(&self, state: VehicleState) {
        let progress = progress_of(self.booking_id, state, self.lifecycle.status());
        self.progress.send_replace(progress);
    }
}
