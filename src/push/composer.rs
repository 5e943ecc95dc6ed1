use serde_json::{Map, Value, json};

use crate::config::AppConfig;
use crate::types::push::{NotificationEvent, NotificationPayload};
use crate::types::rides::RideDecision;

const DEFAULT_CUSTOM_TITLE: &str = "App";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    #[error("notification message must not be empty")]
    EmptyMessage,
}

/// Turns typed events into notification payloads. Pure, no I/O.
#[derive(Debug, Clone)]
pub struct Composer {
    icon: String,
    badge: String,
}

impl Composer {
    pub fn new(icon: impl Into<String>, badge: impl Into<String>) -> Self {
        Self {
            icon: icon.into(),
            badge: badge.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.icon_url.clone(), config.badge_url.clone())
    }

    pub fn compose(&self, event: &NotificationEvent) -> Result<NotificationPayload, ComposeError> {
        let kind = event.kind();
        let mut fields = Map::new();

        let (title, body, tag, require_interaction, click_target) = match event {
            NotificationEvent::DailyData {
                deliveries,
                earnings,
            } => {
                fields.insert("deliveries".to_string(), json!(deliveries));
                fields.insert("earnings".to_string(), json!(earnings));
                (
                    "Today's data".to_string(),
                    format!(
                        "{deliveries} deliveries • {} earned",
                        format_amount(*earnings)
                    ),
                    Some("daily-data".to_string()),
                    false,
                    "/statistics",
                )
            }
            NotificationEvent::PayrollAvailable { net_amount, period } => {
                fields.insert("netAmount".to_string(), json!(net_amount));
                fields.insert("period".to_string(), json!(period));
                (
                    "New payslip".to_string(),
                    format!("New payslip available • Net: {}", format_amount(*net_amount)),
                    Some(format!("payroll-{period}")),
                    false,
                    "/payroll",
                )
            }
            NotificationEvent::ExtraRideRequest {
                ride_id,
                driver_id,
                driver_name,
                date,
            } => {
                fields.insert("rideId".to_string(), json!(ride_id));
                fields.insert("driverId".to_string(), json!(driver_id));
                fields.insert("driverName".to_string(), json!(driver_name));
                fields.insert("date".to_string(), json!(date));
                (
                    "New extra ride".to_string(),
                    format!("{driver_name} requested an extra ride"),
                    Some(format!("extra-ride-{ride_id}")),
                    true,
                    "/admin/extra-rides",
                )
            }
            NotificationEvent::ExtraRideDecision {
                ride_id,
                decision,
                reviewed_by,
                notes,
            } => {
                fields.insert("rideId".to_string(), json!(ride_id));
                fields.insert("decision".to_string(), json!(decision.as_str()));
                fields.insert("reviewedBy".to_string(), json!(reviewed_by));
                if let Some(notes) = notes {
                    fields.insert("notes".to_string(), Value::String(notes.clone()));
                }
                let mark = match decision {
                    RideDecision::Approved => "✅",
                    RideDecision::Rejected => "❌",
                };
                (
                    format!("{mark} Extra ride {}", decision.as_str()),
                    format!("Your extra ride request was {}", decision.as_str()),
                    Some(format!("extra-ride-{ride_id}")),
                    true,
                    "/extra-rides",
                )
            }
            NotificationEvent::CustomMessage { title, body } => {
                if body.trim().is_empty() {
                    return Err(ComposeError::EmptyMessage);
                }
                let title = title
                    .as_deref()
                    .map(str::trim)
                    .filter(|title| !title.is_empty())
                    .unwrap_or(DEFAULT_CUSTOM_TITLE);
                (title.to_string(), body.clone(), None, false, "/")
            }
        };

        Ok(NotificationPayload {
            kind,
            title,
            body,
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            tag,
            require_interaction,
            click_target: click_target.to_string(),
            fields,
        })
    }
}

fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}
