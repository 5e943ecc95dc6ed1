use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::{URL_SAFE, URL_SAFE_NO_PAD, decode_config};
use tokio::sync::Mutex;

use crate::ports::platform::{Permission, PlatformError, PlatformSubscription, PushPlatform};
use crate::ports::store::{DataStore, StoreError};
use crate::ports::time::TimeProvider;
use crate::types::push::{EncryptionKeys, NewSubscription, PushSubscription, RecipientClass};

pub const ADMIN_SENTINEL: &str = "admin";

const P256DH_LEN: usize = 65;
const AUTH_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("push notifications are not supported on this device")]
    Unsupported,
    #[error("notification permission denied; enable notifications in browser settings")]
    PermissionDenied,
    #[error("push subscription has no usable encryption keys: {0}")]
    KeyExtractionFailed(&'static str),
    #[error("push endpoint is not a valid push service url: {0}")]
    InvalidEndpoint(String),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("failed to store push subscription: {0}")]
    StoreWriteFailed(#[from] StoreError),
    #[error("a registration is already in progress")]
    AlreadyInProgress,
}

impl RegistrationError {
    pub fn code(&self) -> &'static str {
        match self {
            RegistrationError::Unsupported => "UNSUPPORTED",
            RegistrationError::PermissionDenied => "PERMISSION_DENIED",
            RegistrationError::KeyExtractionFailed(_) => "KEY_EXTRACTION_FAILED",
            RegistrationError::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            RegistrationError::Platform(_) => "SUBSCRIBE_FAILED",
            RegistrationError::StoreWriteFailed(_) => "STORE_WRITE_FAILED",
            RegistrationError::AlreadyInProgress => "IN_PROGRESS",
        }
    }
}

/// Decides whether a recipient id belongs to an admin or a driver.
#[derive(Debug, Clone, Default)]
pub struct RecipientClassifier {
    admins: HashSet<String>,
}

impl RecipientClassifier {
    pub fn new(admins: impl IntoIterator<Item = String>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    pub fn classify(&self, recipient_id: &str) -> RecipientClass {
        if recipient_id == ADMIN_SENTINEL || self.admins.contains(recipient_id) {
            RecipientClass::Admin
        } else {
            RecipientClass::Driver
        }
    }
}

/// One client session's registration flow. Not shared between sessions.
pub struct Registrar<D, T> {
    store: D,
    time: T,
    application_server_key: String,
    registered: AtomicBool,
    in_flight: Mutex<()>,
}

impl<D, T> Registrar<D, T>
where
    D: DataStore,
    T: TimeProvider,
{
    pub fn new(store: D, time: T, application_server_key: impl Into<String>) -> Self {
        Self {
            store,
            time,
            application_server_key: application_server_key.into(),
            registered: AtomicBool::new(false),
            in_flight: Mutex::new(()),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    pub async fn register<P: PushPlatform>(
        &self,
        platform: &P,
        recipient_id: &str,
        recipient_class: RecipientClass,
    ) -> Result<PushSubscription, RegistrationError> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| RegistrationError::AlreadyInProgress)?;

        if !platform.capabilities().is_supported() {
            return Err(RegistrationError::Unsupported);
        }
        if platform.request_permission().await != Permission::Granted {
            return Err(RegistrationError::PermissionDenied);
        }

        let subscription = platform.subscribe(&self.application_server_key).await?;
        validate_endpoint(&subscription.endpoint)?;
        let keys = extract_keys(&subscription)?;

        let row = self
            .store
            .upsert_subscription(
                NewSubscription {
                    recipient_id: recipient_id.to_string(),
                    recipient_class,
                    endpoint: subscription.endpoint,
                    keys,
                },
                self.time.now(),
            )
            .await?;

        self.registered.store(true, Ordering::SeqCst);
        tracing::info!(
            recipient_id,
            recipient_class = recipient_class.as_str(),
            subscription_id = %row.id,
            "push subscription registered"
        );
        Ok(row)
    }

    pub async fn unregister(&self, endpoint: &str) -> Result<bool, StoreError> {
        let matched = self.store.deactivate_endpoint(endpoint).await?;
        self.registered.store(false, Ordering::SeqCst);
        if matched {
            tracing::info!("push subscription unregistered");
        }
        Ok(matched)
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), RegistrationError> {
    let invalid = || RegistrationError::InvalidEndpoint(endpoint.to_string());
    let url = url::Url::parse(endpoint).map_err(|_| invalid())?;
    let host = url.host_str().ok_or_else(invalid)?;
    match url.scheme() {
        "https" => Ok(()),
        "http" if host == "localhost" || host == "127.0.0.1" => Ok(()),
        _ => Err(invalid()),
    }
}

fn extract_keys(subscription: &PlatformSubscription) -> Result<EncryptionKeys, RegistrationError> {
    let p256dh = subscription
        .p256dh
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(RegistrationError::KeyExtractionFailed("missing p256dh key"))?;
    let auth = subscription
        .auth
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(RegistrationError::KeyExtractionFailed("missing auth secret"))?;

    let p256dh_bytes = decode_key(p256dh)
        .ok_or(RegistrationError::KeyExtractionFailed("p256dh is not base64url"))?;
    if p256dh_bytes.len() != P256DH_LEN || p256dh_bytes[0] != 0x04 {
        return Err(RegistrationError::KeyExtractionFailed(
            "p256dh is not an uncompressed P-256 point",
        ));
    }
    let auth_bytes =
        decode_key(auth).ok_or(RegistrationError::KeyExtractionFailed("auth is not base64url"))?;
    if auth_bytes.len() != AUTH_LEN {
        return Err(RegistrationError::KeyExtractionFailed(
            "auth secret must be 16 bytes",
        ));
    }

    Ok(EncryptionKeys {
        p256dh: p256dh.to_string(),
        auth: auth.to_string(),
    })
}

fn decode_key(raw: &str) -> Option<Vec<u8>> {
    decode_config(raw, URL_SAFE_NO_PAD)
        .or_else(|_| decode_config(raw, URL_SAFE))
        .ok()
}
