use uuid::Uuid;

use crate::events::{EventHub, Unsubscribe};
use crate::ports::store::{DataStore, StoreError};
use crate::ports::time::TimeProvider;
use crate::types::push::{NotificationEvent, TargetSelector};
use crate::types::rides::{ExtraRide, NewExtraRide, RideDecision, RideReview};

#[derive(Debug, thiserror::Error)]
pub enum RideError {
    #[error("invalid extra ride: {0}")]
    Invalid(&'static str),
    #[error("extra ride {0} not found")]
    NotFound(Uuid),
    #[error("extra ride {0} was already reviewed")]
    AlreadyReviewed(Uuid),
    #[error("failed to store extra ride: {0}")]
    Store(StoreError),
}

impl RideError {
    pub fn code(&self) -> &'static str {
        match self {
            RideError::Invalid(_) => "INVALID_RIDE",
            RideError::NotFound(_) => "RIDE_NOT_FOUND",
            RideError::AlreadyReviewed(_) => "ALREADY_REVIEWED",
            RideError::Store(_) => "STORE_FAILED",
        }
    }
}

impl From<StoreError> for RideError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => RideError::NotFound(id),
            StoreError::AlreadyReviewed(id) => RideError::AlreadyReviewed(id),
            other => RideError::Store(other),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RideEvent {
    Requested(ExtraRide),
    Decided(ExtraRide),
}

impl RideEvent {
    /// The notification this event causes and who receives it.
    pub fn notification(&self) -> Option<(NotificationEvent, TargetSelector)> {
        match self {
            RideEvent::Requested(ride) => Some((
                NotificationEvent::ExtraRideRequest {
                    ride_id: ride.id,
                    driver_id: ride.driver_id.clone(),
                    driver_name: ride.driver_name.clone(),
                    date: ride.date.clone(),
                },
                TargetSelector::AdminsOnly,
            )),
            RideEvent::Decided(ride) => {
                let decision = ride_decision(ride)?;
                Some((
                    NotificationEvent::ExtraRideDecision {
                        ride_id: ride.id,
                        decision,
                        reviewed_by: ride.reviewed_by.clone().unwrap_or_default(),
                        notes: ride.review_notes.clone(),
                    },
                    TargetSelector::ExplicitRecipients {
                        recipients: vec![ride.driver_id.clone()],
                    },
                ))
            }
        }
    }
}

fn ride_decision(ride: &ExtraRide) -> Option<RideDecision> {
    use crate::types::rides::RideStatus;

    match ride.status {
        RideStatus::Approved => Some(RideDecision::Approved),
        RideStatus::Rejected => Some(RideDecision::Rejected),
        RideStatus::Pending => None,
    }
}

/// Extra-ride requests and reviews. Publishes a `RideEvent` after each
/// recorded change.
#[derive(Clone)]
pub struct ExtraRideDesk<D, T> {
    store: D,
    time: T,
    events: EventHub<RideEvent>,
}

impl<D, T> ExtraRideDesk<D, T>
where
    D: DataStore,
    T: TimeProvider,
{
    pub fn new(store: D, time: T) -> Self {
        Self {
            store,
            time,
            events: EventHub::new(),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> Unsubscribe<RideEvent>
    where
        F: Fn(&RideEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    pub async fn request(&self, ride: NewExtraRide) -> Result<ExtraRide, RideError> {
        let ride = NewExtraRide {
            driver_id: required(ride.driver_id, "driverId is required")?,
            driver_name: required(ride.driver_name, "driverName is required")?,
            date: required(ride.date, "date is required")?,
            note: ride.note.filter(|note| !note.trim().is_empty()),
        };
        let row = self.store.insert_ride(ride, self.time.now()).await?;
        tracing::info!(ride_id = %row.id, driver_id = %row.driver_id, "extra ride requested");
        self.events.publish(&RideEvent::Requested(row.clone()));
        Ok(row)
    }

    pub async fn review(&self, id: Uuid, review: RideReview) -> Result<ExtraRide, RideError> {
        if review.reviewed_by.trim().is_empty() {
            return Err(RideError::Invalid("reviewedBy is required"));
        }
        let row = self.store.review_ride(id, review, self.time.now()).await?;
        tracing::info!(
            ride_id = %row.id,
            status = ?row.status,
            "extra ride reviewed"
        );
        self.events.publish(&RideEvent::Decided(row.clone()));
        Ok(row)
    }
}

fn required(value: String, message: &'static str) -> Result<String, RideError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RideError::Invalid(message));
    }
    Ok(trimmed.to_string())
}
