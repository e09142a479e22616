/// Failures reported by location and compass sources.
///
/// `PermissionDenied` and `ProviderDisabled` need different user action
/// (grant access vs. enable the provider), so they stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location provider disabled")]
    ProviderDisabled,

    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(&'static str),

    #[error("Source closed")]
    Closed,
}
