use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::rides::RideDecision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientClass {
    Driver,
    Admin,
}

impl RecipientClass {
    pub fn as_str(self) -> &'static str {
        match self {
            RecipientClass::Driver => "driver",
            RecipientClass::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub id: Uuid,
    pub recipient_id: String,
    pub recipient_class: RecipientClass,
    pub endpoint: String,
    pub keys: EncryptionKeys,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_used_at: OffsetDateTime,
}

/// Input for an upsert keyed by `endpoint`.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub recipient_id: String,
    pub recipient_class: RecipientClass,
    pub endpoint: String,
    pub keys: EncryptionKeys,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VapidConfig {
    pub private_key: String,
    pub public_key: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetSelector {
    All,
    DriversOnly,
    AdminsOnly,
    ExplicitRecipients { recipients: Vec<String> },
}

impl TargetSelector {
    pub fn matches(&self, subscription: &PushSubscription) -> bool {
        match self {
            TargetSelector::All => true,
            TargetSelector::DriversOnly => subscription.recipient_class == RecipientClass::Driver,
            TargetSelector::AdminsOnly => subscription.recipient_class == RecipientClass::Admin,
            TargetSelector::ExplicitRecipients { recipients } => recipients
                .iter()
                .any(|recipient| recipient == &subscription.recipient_id),
        }
    }

    /// Name passed to the store-side procedure as `target_type`.
    pub fn target_type(&self) -> &'static str {
        match self {
            TargetSelector::All => "all",
            TargetSelector::DriversOnly => "drivers",
            TargetSelector::AdminsOnly => "admins",
            TargetSelector::ExplicitRecipients { .. } => "users",
        }
    }

    pub fn explicit_recipients(&self) -> &[String] {
        match self {
            TargetSelector::ExplicitRecipients { recipients } => recipients,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DailyData,
    PayrollAvailable,
    ExtraRideRequest,
    ExtraRideDecision,
    CustomMessage,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::DailyData => "daily_data",
            NotificationKind::PayrollAvailable => "payroll_available",
            NotificationKind::ExtraRideRequest => "extra_ride_request",
            NotificationKind::ExtraRideDecision => "extra_ride_decision",
            NotificationKind::CustomMessage => "custom_message",
        }
    }
}

/// A typed event to be turned into a notification by the composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum NotificationEvent {
    DailyData {
        deliveries: u32,
        earnings: f64,
    },
    PayrollAvailable {
        net_amount: f64,
        period: String,
    },
    ExtraRideRequest {
        ride_id: Uuid,
        driver_id: String,
        driver_name: String,
        date: String,
    },
    ExtraRideDecision {
        ride_id: Uuid,
        decision: RideDecision,
        reviewed_by: String,
        notes: Option<String>,
    },
    CustomMessage {
        title: Option<String>,
        body: String,
    },
}

impl NotificationEvent {
    pub fn kind(&self) -> NotificationKind {
        match self {
            NotificationEvent::DailyData { .. } => NotificationKind::DailyData,
            NotificationEvent::PayrollAvailable { .. } => NotificationKind::PayrollAvailable,
            NotificationEvent::ExtraRideRequest { .. } => NotificationKind::ExtraRideRequest,
            NotificationEvent::ExtraRideDecision { .. } => NotificationKind::ExtraRideDecision,
            NotificationEvent::CustomMessage { .. } => NotificationKind::CustomMessage,
        }
    }
}

/// A composed notification, independent of any recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPayload {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: Option<String>,
    pub require_interaction: bool,
    pub click_target: String,
    pub fields: Map<String, Value>,
}

impl NotificationPayload {
    /// Renders the JSON document delivered to one subscription.
    pub fn render(
        &self,
        recipient_id: &str,
        notification_id: Uuid,
        timestamp: OffsetDateTime,
    ) -> WirePayload {
        WirePayload {
            title: self.title.clone(),
            body: self.body.clone(),
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            tag: self.tag.clone(),
            require_interaction: self.require_interaction,
            data: WireData {
                kind: self.kind.as_str().to_string(),
                timestamp: epoch_millis(timestamp),
                recipient_id: recipient_id.to_string(),
                notification_id,
                url: self.click_target.clone(),
                fields: self.fields.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub require_interaction: bool,
    pub data: WireData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireData {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: i64,
    pub recipient_id: String,
    pub notification_id: Uuid,
    pub url: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn epoch_millis(timestamp: OffsetDateTime) -> i64 {
    (timestamp.unix_timestamp_nanos() / 1_000_000) as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryTier {
    #[serde(rename = "web-push")]
    ServerPush,
    #[serde(rename = "store-rpc")]
    StoreRpc,
    #[serde(rename = "local")]
    Local,
}

impl DeliveryTier {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryTier::ServerPush => "web-push",
            DeliveryTier::StoreRpc => "store-rpc",
            DeliveryTier::Local => "local",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryMetadata {
    pub tier: DeliveryTier,
    pub subscription_id: Option<Uuid>,
    pub endpoint_fingerprint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLogEntry {
    pub id: Uuid,
    pub recipient_id: String,
    pub recipient_class: RecipientClass,
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
    pub status: DeliveryStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub sent_at: Option<OffsetDateTime>,
    pub error_message: Option<String>,
    pub metadata: DeliveryMetadata,
}

#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub recipient_id: String,
    pub recipient_class: RecipientClass,
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
    pub metadata: DeliveryMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub success: bool,
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
    pub method: Option<DeliveryTier>,
}

impl DispatchResult {
    pub(crate) fn nobody() -> Self {
        Self {
            success: true,
            sent: 0,
            failed: 0,
            total: 0,
            method: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPushRequest {
    pub title: String,
    pub message: String,
    pub target_users: Vec<String>,
    pub target_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPushResponse {
    pub sent_count: usize,
    pub failed_count: usize,
}
