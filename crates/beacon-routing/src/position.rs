//! One-shot position acquisition, treated as an external capability.

use thiserror::Error;

use beacon_types::geo::GeoPoint;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PositionError {
    #[error("position permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    Unavailable,
    #[error("position fix timed out")]
    Timeout,
}

/// A source of the viewer's current position: a platform location
/// service, a paired device, a test stub. Implementations must resolve or
/// fail within a bounded wait of their own; callers add no retry.
pub trait PositionSource {
    fn current_position(&self) -> impl Future<Output = Result<GeoPoint, PositionError>> + Send;
}
