use crate::ports::platform::Permission;
use crate::ports::surface::NotificationSurface;
use crate::types::push::WirePayload;

/// Something that can put a notification in front of the initiating user.
pub trait Present: Send + Sync {
    /// Returns whether the notification was shown. Never fails.
    fn present(&self, payload: &WirePayload) -> bool;
}

#[derive(Debug, Clone)]
pub struct Presenter<S> {
    surface: S,
}

impl<S: NotificationSurface> Presenter<S> {
    pub fn new(surface: S) -> Self {
        Self { surface }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    fn show_foreground(&self, payload: &WirePayload) -> bool {
        // A fresh permission prompt is never raised from here.
        if self.surface.permission() != Permission::Granted {
            tracing::debug!(title = %payload.title, "notification permission not granted");
            return false;
        }
        match self.surface.show_foreground(payload) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "foreground notification failed");
                false
            }
        }
    }
}

impl<S: NotificationSurface> Present for Presenter<S> {
    fn present(&self, payload: &WirePayload) -> bool {
        if !self.surface.has_worker() {
            return self.show_foreground(payload);
        }
        match self.surface.show_via_worker(payload) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "worker notification failed, trying foreground");
                self.show_foreground(payload)
            }
        }
    }
}
