use crate::ports::platform::Permission;
use crate::types::push::WirePayload;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("notification could not be shown: {0}")]
pub struct SurfaceError(pub String);

/// Where a notification is rendered on the receiving device.
pub trait NotificationSurface: Send + Sync {
    fn has_worker(&self) -> bool;

    fn permission(&self) -> Permission;

    fn show_via_worker(&self, payload: &WirePayload) -> Result<(), SurfaceError>;

    fn show_foreground(&self, payload: &WirePayload) -> Result<(), SurfaceError>;
}
