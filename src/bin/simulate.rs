use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skylift::clock::SystemClock;
use skylift::skyport::SkyportDirectory;
use skylift::{
    BookingOrchestrator, BookingRequest, DEFAULT_TIER, MemoryStore, OrchestratorConfig,
    PricingProfile, ServiceTier, SimulatorConfig, TripOutcome, env_or,
};
use tracing::{info, warn};

/// Book a random route between two skyports and fly it on the in-memory store.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let tier: ServiceTier = env_or("SKYLIFT_TIER", DEFAULT_TIER)?;
    let tick_ms: u64 = env_or("SKYLIFT_TICK_MS", 250)?;
    let profile_name = std::env::var("SKYLIFT_PROFILE")
        .unwrap_or_else(|_| PricingProfile::STANDARD.to_string());
    let profile = PricingProfile::named(&profile_name)
        .ok_or_else(|| anyhow!("unknown pricing profile {profile_name:?}"))?;

    let mut rng = match std::env::var("SKYLIFT_SEED") {
        Ok(_) => StdRng::seed_from_u64(env_or("SKYLIFT_SEED", 0)?),
        Err(_) => StdRng::from_os_rng(),
    };

    let directory = SkyportDirectory::bangalore();
    let ports: Vec<_> = directory.iter().collect();
    if ports.len() < 2 {
        return Err(anyhow!("need at least two skyports to fly between"));
    }
    let from = rng.random_range(0..ports.len());
    // Offset by at least one so pickup and destination differ
    let to = (from + rng.random_range(1..ports.len())) % ports.len();
    let (pickup, destination) = (ports[from], ports[to]);

    let store = Arc::new(MemoryStore::with_user("demo-rider"));
    let config = OrchestratorConfig::builder()
        .pricing(profile)
        .simulator(
            SimulatorConfig::builder()
                .tick_interval(Duration::from_millis(tick_ms))
                .build(),
        )
        .build();
    let orchestrator = BookingOrchestrator::with_clock(Arc::clone(&store), SystemClock, config);

    let booking = orchestrator
        .create_booking(BookingRequest::new(
            pickup.location.clone(),
            destination.location.clone(),
            tier,
        ))
        .await?;

    info!(
        booking_id = %booking.id,
        from = %pickup.name,
        to = %destination.name,
        tier = tier.display_name(),
        km = booking.quote.base_distance_km,
        fare = booking.quote.final_price,
        eta_min = booking.estimated_duration_min,
        "Booked"
    );

    let trip = orchestrator.attach_simulator(&booking).await?;

    let updates = trip.updates();
    let reporter = tokio::spawn(async move {
        let mut updates = std::pin::pin!(updates);
        while let Some(progress) = updates.next().await {
            info!(
                tick = progress.ticks,
                lat = progress.vehicle.position.lat,
                lng = progress.vehicle.position.lng,
                remaining_km = progress.remaining_km,
                eta_min = progress.eta_min,
                status = %progress.status,
                "Progress"
            );
        }
    });

    let outcome = tokio::select! {
        outcome = trip.finished() => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, detaching from trip");
            TripOutcome::Detached
        }
    };
    reporter.await?;

    let booking = orchestrator.booking(booking.id).await?;
    info!(booking_id = %booking.id, outcome = ?outcome, status = %booking.status, "Done");

    Ok(())
}
