use anyhow::{Context, Result, anyhow};
use skylift::clock::{Clock, SystemClock};
use skylift::skyport::{Skyport, SkyportDirectory};
use skylift::{DEFAULT_TIER, PricingProfile, ServiceTier, env_or};
use tracing::{debug, info};

/// Print fares between skyports.
///
/// With `SKYLIFT_PICKUP` and `SKYLIFT_DESTINATION` set to skyport ids a single route is priced,
/// otherwise every route in the directory is. Tier and fare formula come from `SKYLIFT_TIER` and
/// `SKYLIFT_PROFILE`.
fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let tier: ServiceTier = env_or("SKYLIFT_TIER", DEFAULT_TIER)?;
    let profile_name = std::env::var("SKYLIFT_PROFILE")
        .unwrap_or_else(|_| PricingProfile::STANDARD.to_string());
    let profile = PricingProfile::named(&profile_name)
        .ok_or_else(|| anyhow!("unknown pricing profile {profile_name:?}"))?;

    let directory = SkyportDirectory::bangalore();
    let now = SystemClock.local_now();

    info!(
        tier = %tier,
        profile = %profile.name,
        hour = %now.format("%H:%M"),
        "Quoting"
    );

    let pickup = std::env::var("SKYLIFT_PICKUP").ok();
    let destination = std::env::var("SKYLIFT_DESTINATION").ok();
    let routes: Vec<(&Skyport, &Skyport)> = match (pickup, destination) {
        (None, None) => directory
            .iter()
            .flat_map(|from| {
                directory
                    .iter()
                    .filter(move |to| to.id != from.id)
                    .map(move |to| (from, to))
            })
            .collect(),
        (Some(from), Some(to)) => vec![(lookup(&directory, &from)?, lookup(&directory, &to)?)],
        _ => return Err(anyhow!("set both SKYLIFT_PICKUP and SKYLIFT_DESTINATION, or neither")),
    };

    println!(
        "{:<18} {:<18} {:>8} {:>6} {:>6} {:>10} {:>6}",
        "from", "to", "km", "cplx", "surge", "fare", "min"
    );
    for (from, to) in routes {
        let quote = profile.quote(&from.location, &to.location, tier, now);
        debug!(from = %from.id, to = %to.id, quote = ?quote, "Quoted route");

        println!(
            "{:<18} {:<18} {:>8.2} {:>6.2} {:>6.2} {:>10.2} {:>6}",
            from.id,
            to.id,
            quote.base_distance_km,
            quote.route_complexity,
            quote.surge_multiplier,
            quote.final_price,
            quote.estimated_duration_min,
        );
    }

    Ok(())
}

fn lookup<'a>(directory: &'a SkyportDirectory, id: &str) -> Result<&'a Skyport> {
    directory.get(id).with_context(|| {
        let known: Vec<&str> = directory.iter().map(|port| &*port.id).collect();
        format!("unknown skyport {id:?}, expected one of {}", known.join(", "))
    })
}
