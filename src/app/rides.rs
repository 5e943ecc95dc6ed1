use crate::app::{ApiError, api_error};
use crate::rides::RideError;
use crate::state;
use crate::types::rides::{ExtraRide, NewExtraRide, RideDecision, RideReview};

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

pub(crate) async fn ride_request(
    State(state): State<state::AppState>,
    Json(request): Json<NewExtraRide>,
) -> Result<(StatusCode, Json<ExtraRide>), ApiError> {
    let ride = state.rides.request(request).await.map_err(ride_error)?;
    Ok((StatusCode::CREATED, Json(ride)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReviewRequest {
    pub(crate) action: RideDecision,
    pub(crate) reviewed_by: String,
    pub(crate) notes: Option<String>,
}

pub(crate) async fn ride_review(
    State(state): State<state::AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<ExtraRide>, ApiError> {
    let review = RideReview {
        decision: request.action,
        reviewed_by: request.reviewed_by,
        notes: request.notes.filter(|notes| !notes.trim().is_empty()),
    };
    let ride = state.rides.review(id, review).await.map_err(ride_error)?;
    Ok(Json(ride))
}

fn ride_error(err: RideError) -> ApiError {
    let status = match &err {
        RideError::Invalid(_) => StatusCode::BAD_REQUEST,
        RideError::NotFound(_) => StatusCode::NOT_FOUND,
        RideError::AlreadyReviewed(_) => StatusCode::CONFLICT,
        RideError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    api_error(status, err.code(), err)
}
