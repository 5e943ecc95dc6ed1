use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushCapabilities {
    pub service_worker: bool,
    pub push_manager: bool,
    pub notifications: bool,
}

impl PushCapabilities {
    pub fn full() -> Self {
        Self {
            service_worker: true,
            push_manager: true,
            notifications: true,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.service_worker && self.push_manager && self.notifications
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    Default,
    Granted,
    Denied,
}

/// What the browser's push manager handed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSubscription {
    pub endpoint: String,
    pub p256dh: Option<String>,
    pub auth: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("push subscription failed: {0}")]
    Subscribe(String),
}

pub trait PushPlatform: Send + Sync {
    fn capabilities(&self) -> PushCapabilities;

    fn request_permission(&self) -> impl Future<Output = Permission> + Send;

    fn subscribe(
        &self,
        application_server_key: &str,
    ) -> impl Future<Output = Result<PlatformSubscription, PlatformError>> + Send;
}
