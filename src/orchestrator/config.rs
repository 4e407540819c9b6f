use bon::Builder;

use crate::pricing::PricingProfile;
use crate::trip::SimulatorConfig;

/// Configuration for the booking orchestrator.
#[derive(Debug, Clone, Default, Builder)]
pub struct OrchestratorConfig {
    /// Fare formula applied to new quotes and bookings.
    #[builder(default)]
    pub pricing: PricingProfile,

    /// Tick rate and motion settings of the trip simulators.
    #[builder(default)]
    pub simulator: SimulatorConfig,
}
