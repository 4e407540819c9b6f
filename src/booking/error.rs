//! Error types for booking request validation.

/// A booking request was missing a field required before it can be priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("a pickup location is required")]
    MissingPickup,

    #[error("a destination is required")]
    MissingDestination,

    #[error("a service tier is required")]
    MissingTier,
}
