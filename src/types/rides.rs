use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideDecision {
    Approved,
    Rejected,
}

impl RideDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            RideDecision::Approved => "approved",
            RideDecision::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Pending,
    Approved,
    Rejected,
}

impl From<RideDecision> for RideStatus {
    fn from(decision: RideDecision) -> Self {
        match decision {
            RideDecision::Approved => RideStatus::Approved,
            RideDecision::Rejected => RideStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraRide {
    pub id: Uuid,
    pub driver_id: String,
    pub driver_name: String,
    pub date: String,
    pub note: Option<String>,
    pub status: RideStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
    pub reviewed_by: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
    pub review_notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExtraRide {
    pub driver_id: String,
    pub driver_name: String,
    pub date: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RideReview {
    pub decision: RideDecision,
    pub reviewed_by: String,
    pub notes: Option<String>,
}
