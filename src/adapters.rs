use std::pin::Pin;
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;

use crate::ports;
use crate::ports::platform::{Permission, PlatformError, PlatformSubscription, PushCapabilities};
use crate::ports::push::SendError;
use crate::ports::surface::SurfaceError;
use crate::types::push::{PushSubscription, VapidConfig, WirePayload};

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimeProvider;

impl ports::TimeProvider for TokioTimeProvider {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[derive(Clone)]
pub struct WebPushSender {
    vapid: VapidConfig,
    ttl_secs: u32,
    client: Arc<web_push::WebPushClient>,
}

impl WebPushSender {
    pub fn new(vapid: VapidConfig, ttl_secs: u32) -> Result<Self, web_push::WebPushError> {
        let client = web_push::WebPushClient::new()?;
        Ok(Self {
            vapid,
            ttl_secs,
            client: Arc::new(client),
        })
    }

    async fn send_message(
        &self,
        subscription: &PushSubscription,
        message: &str,
    ) -> Result<(), web_push::WebPushError> {
        let subscription_info = web_push::SubscriptionInfo::new(
            subscription.endpoint.clone(),
            subscription.keys.p256dh.clone(),
            subscription.keys.auth.clone(),
        );
        let mut builder = web_push::WebPushMessageBuilder::new(&subscription_info)?;
        builder.set_payload(web_push::ContentEncoding::Aes128Gcm, message.as_bytes());
        builder.set_ttl(self.ttl_secs);
        let mut signature_builder = web_push::VapidSignatureBuilder::from_base64(
            &self.vapid.private_key,
            web_push::URL_SAFE_NO_PAD,
            &subscription_info,
        )?;
        signature_builder.add_claim("sub", self.vapid.subject.as_str());
        builder.set_vapid_signature(signature_builder.build()?);
        self.client.send(builder.build()?).await
    }
}

impl ports::PushSender for WebPushSender {
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<(), SendError>> + Send + 'a>>
    where
        Self: 'a;

    fn send<'a>(&'a self, subscription: &'a PushSubscription, message: &'a str) -> Self::Fut<'a> {
        Box::pin(async move {
            self.send_message(subscription, message)
                .await
                .map_err(classify_web_push_error)
        })
    }
}

fn classify_web_push_error(err: web_push::WebPushError) -> SendError {
    use web_push::WebPushError;

    match err {
        WebPushError::EndpointNotValid { .. } | WebPushError::EndpointNotFound { .. } => {
            SendError::Gone
        }
        WebPushError::InvalidUri => SendError::InvalidEndpoint,
        WebPushError::Unauthorized { .. }
        | WebPushError::BadRequest { .. }
        | WebPushError::PayloadTooLarge
        | WebPushError::InvalidCryptoKeys
        | WebPushError::MissingCryptoKeys => SendError::Rejected(err.to_string()),
        other => SendError::Transport(other.to_string()),
    }
}

/// Collects payloads instead of showing them. The HTTP layer hands them back
/// to the initiating page, which renders them itself.
#[derive(Debug, Default)]
pub struct RelaySurface {
    relayed: Mutex<Vec<WirePayload>>,
}

impl RelaySurface {
    pub fn take(&self) -> Vec<WirePayload> {
        match self.relayed.lock() {
            Ok(mut relayed) => std::mem::take(&mut *relayed),
            Err(_) => Vec::new(),
        }
    }
}

impl ports::NotificationSurface for RelaySurface {
    fn has_worker(&self) -> bool {
        true
    }

    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn show_via_worker(&self, payload: &WirePayload) -> Result<(), SurfaceError> {
        let mut relayed = self
            .relayed
            .lock()
            .map_err(|_| SurfaceError("relay lock poisoned".to_string()))?;
        relayed.push(payload.clone());
        Ok(())
    }

    fn show_foreground(&self, payload: &WirePayload) -> Result<(), SurfaceError> {
        self.show_via_worker(payload)
    }
}

/// What a browser already did on its side, replayed for the registrar.
#[derive(Debug, Clone)]
pub struct SubmittedPlatform {
    pub capabilities: PushCapabilities,
    pub permission: Permission,
    pub subscription: Option<PlatformSubscription>,
}

impl ports::PushPlatform for SubmittedPlatform {
    fn capabilities(&self) -> PushCapabilities {
        self.capabilities
    }

    fn request_permission(&self) -> impl Future<Output = Permission> + Send {
        std::future::ready(self.permission)
    }

    fn subscribe(
        &self,
        _application_server_key: &str,
    ) -> impl Future<Output = Result<PlatformSubscription, PlatformError>> + Send {
        std::future::ready(self.subscription.clone().ok_or_else(|| {
            PlatformError::Subscribe("browser did not return a subscription".to_string())
        }))
    }
}
