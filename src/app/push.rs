use crate::adapters::{RelaySurface, SubmittedPlatform};
use crate::app::{ApiError, api_error};
use crate::ports::platform::{Permission, PlatformSubscription, PushCapabilities};
use crate::ports::store::DataStore;
use crate::push::delivery_log::{DeliveryStats, recent_entries};
use crate::push::{ComposeError, Presenter, Registrar, RegistrationError};
use crate::state;
use crate::types::push::{
    DeliveryLogEntry, DeliveryTier, DispatchResult, NotificationEvent, PushSubscription,
    RecipientClass, TargetSelector, WirePayload,
};

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

const DEFAULT_LOG_LIMIT: usize = 100;

#[derive(Serialize)]
pub(crate) struct PublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub(crate) public_key: String,
}

pub(crate) async fn push_public_key(
    State(state): State<state::AppState>,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let vapid = state.vapid.as_ref().ok_or_else(not_configured)?;
    Ok(Json(PublicKeyResponse {
        public_key: vapid.public_key.clone(),
    }))
}

fn not_configured() -> ApiError {
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "PUSH_NOT_CONFIGURED",
        "Push notifications are not configured.",
    )
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BrowserKeys {
    pub(crate) p256dh: Option<String>,
    pub(crate) auth: Option<String>,
}

/// `PushSubscription.toJSON()` as sent by the browser.
#[derive(Debug, Deserialize)]
pub(crate) struct BrowserSubscription {
    pub(crate) endpoint: String,
    #[serde(default)]
    pub(crate) keys: BrowserKeys,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterRequest {
    pub(crate) recipient_id: String,
    pub(crate) recipient_class: Option<RecipientClass>,
    #[serde(default)]
    pub(crate) capabilities: PushCapabilities,
    #[serde(default)]
    pub(crate) permission: Permission,
    pub(crate) subscription: Option<BrowserSubscription>,
}

#[derive(Serialize)]
pub(crate) struct RegisterResponse {
    pub(crate) registered: bool,
    pub(crate) subscription: PushSubscription,
}

pub(crate) async fn push_register(
    State(state): State<state::AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let recipient_id = request.recipient_id.trim();
    if recipient_id.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_RECIPIENT",
            "recipientId is required.",
        ));
    }
    let recipient_class = request
        .recipient_class
        .unwrap_or_else(|| state.classifier.classify(recipient_id));

    let platform = SubmittedPlatform {
        capabilities: request.capabilities,
        permission: request.permission,
        subscription: request.subscription.map(|subscription| PlatformSubscription {
            endpoint: subscription.endpoint,
            p256dh: subscription.keys.p256dh,
            auth: subscription.keys.auth,
        }),
    };
    let application_server_key = state
        .vapid
        .as_ref()
        .map(|vapid| vapid.public_key.clone())
        .unwrap_or_default();
    let registrar = Registrar::new(state.store.clone(), state.time, application_server_key);

    let subscription = registrar
        .register(&platform, recipient_id, recipient_class)
        .await
        .map_err(|err| {
            tracing::warn!(%err, recipient_id, "push registration failed");
            registration_error(err)
        })?;

    Ok(Json(RegisterResponse {
        registered: registrar.is_registered(),
        subscription,
    }))
}

fn registration_error(err: RegistrationError) -> ApiError {
    let status = match &err {
        RegistrationError::PermissionDenied => StatusCode::FORBIDDEN,
        RegistrationError::AlreadyInProgress => StatusCode::CONFLICT,
        RegistrationError::StoreWriteFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
        RegistrationError::Unsupported
        | RegistrationError::KeyExtractionFailed(_)
        | RegistrationError::InvalidEndpoint(_)
        | RegistrationError::Platform(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    api_error(status, err.code(), err)
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnregisterRequest {
    pub(crate) endpoint: String,
}

#[derive(Serialize)]
pub(crate) struct UnregisterResponse {
    pub(crate) removed: bool,
}

pub(crate) async fn push_unregister(
    State(state): State<state::AppState>,
    Json(request): Json<UnregisterRequest>,
) -> Result<Json<UnregisterResponse>, ApiError> {
    let registrar = Registrar::new(state.store.clone(), state.time, String::new());
    let removed = registrar
        .unregister(&request.endpoint)
        .await
        .map_err(|err| api_error(StatusCode::SERVICE_UNAVAILABLE, "STORE_FAILED", err))?;
    Ok(Json(UnregisterResponse { removed }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendRequest {
    pub(crate) title: Option<String>,
    pub(crate) message: String,
    pub(crate) target_type: String,
    #[serde(default)]
    pub(crate) target_users: Vec<String>,
}

#[derive(Serialize)]
pub(crate) struct SendResponse {
    pub(crate) success: bool,
    pub(crate) sent: usize,
    pub(crate) failed: usize,
    pub(crate) total: usize,
    pub(crate) method: Option<DeliveryTier>,
    /// Payloads for the calling page to render itself.
    pub(crate) local: Vec<WirePayload>,
}

impl SendResponse {
    fn new(result: DispatchResult, local: Vec<WirePayload>) -> Self {
        Self {
            success: result.success,
            sent: result.sent,
            failed: result.failed,
            total: result.total,
            method: result.method,
            local,
        }
    }
}

pub(crate) async fn push_send(
    State(state): State<state::AppState>,
    Json(request): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let target = target_selector(&request.target_type, request.target_users).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_TARGET",
            format!("unknown targetType '{}'", request.target_type),
        )
    })?;

    let initiator = Presenter::new(RelaySurface::default());
    let result = state
        .push
        .send_custom_message(request.title, request.message, &target, Some(&initiator))
        .await
        .map_err(compose_error)?;

    Ok(Json(SendResponse::new(result, initiator.surface().take())))
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventRequest {
    pub(crate) event: NotificationEvent,
    pub(crate) target: TargetSelector,
}

pub(crate) async fn push_event(
    State(state): State<state::AppState>,
    Json(request): Json<EventRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let initiator = Presenter::new(RelaySurface::default());
    let result = state
        .push
        .notify(&request.event, &request.target, Some(&initiator))
        .await
        .map_err(compose_error)?;

    Ok(Json(SendResponse::new(result, initiator.surface().take())))
}

fn compose_error(err: ComposeError) -> ApiError {
    match err {
        ComposeError::EmptyMessage => api_error(StatusCode::BAD_REQUEST, "EMPTY_MESSAGE", err),
    }
}

fn target_selector(target_type: &str, target_users: Vec<String>) -> Option<TargetSelector> {
    match target_type {
        "all" => Some(TargetSelector::All),
        "drivers" => Some(TargetSelector::DriversOnly),
        "admins" => Some(TargetSelector::AdminsOnly),
        "users" => Some(TargetSelector::ExplicitRecipients {
            recipients: target_users,
        }),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LogQuery {
    pub(crate) recipient_id: Option<String>,
    pub(crate) limit: Option<usize>,
}

pub(crate) async fn push_logs(
    State(state): State<state::AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<DeliveryLogEntry>>, ApiError> {
    let entries = state
        .store
        .delivery_log()
        .await
        .map_err(|err| api_error(StatusCode::SERVICE_UNAVAILABLE, "STORE_FAILED", err))?;
    Ok(Json(recent_entries(
        entries,
        query.recipient_id.as_deref(),
        query.limit.unwrap_or(DEFAULT_LOG_LIMIT),
    )))
}

pub(crate) async fn push_stats(
    State(state): State<state::AppState>,
) -> Result<Json<DeliveryStats>, ApiError> {
    let entries = state
        .store
        .delivery_log()
        .await
        .map_err(|err| api_error(StatusCode::SERVICE_UNAVAILABLE, "STORE_FAILED", err))?;
    Ok(Json(DeliveryStats::from_entries(&entries)))
}
