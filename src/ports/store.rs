use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::push::{
    CustomPushRequest, CustomPushResponse, DeliveryLogEntry, DeliveryTier, NewLogEntry,
    NewSubscription, PushSubscription,
};
use crate::types::rides::{ExtraRide, NewExtraRide, RideReview};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("data store unavailable: {0}")]
    Unavailable(String),
    #[error("stored procedure unavailable: {0}")]
    RpcUnavailable(String),
    #[error("record {0} not found")]
    NotFound(Uuid),
    #[error("delivery log entry {0} is already terminal")]
    AlreadyTerminal(Uuid),
    #[error("extra ride {0} was already reviewed")]
    AlreadyReviewed(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    Sent,
    Failed(String),
}

/// The hosted persistence platform, reduced to what the push pipeline touches.
pub trait DataStore: Clone + Send + Sync + 'static {
    fn upsert_subscription(
        &self,
        subscription: NewSubscription,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<PushSubscription, StoreError>> + Send;

    fn active_subscriptions(
        &self,
    ) -> impl Future<Output = Result<Vec<PushSubscription>, StoreError>> + Send;

    fn deactivate_subscription(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns whether an active row matched.
    fn deactivate_endpoint(
        &self,
        endpoint: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn touch_subscription(
        &self,
        id: Uuid,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Appends a `pending` row.
    fn insert_log(
        &self,
        entry: NewLogEntry,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<DeliveryLogEntry, StoreError>> + Send;

    /// Moves a `pending` row, matched by id, to its terminal status and
    /// records the tier that settled it.
    fn finish_log(
        &self,
        id: Uuid,
        tier: DeliveryTier,
        outcome: LogOutcome,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<DeliveryLogEntry, StoreError>> + Send;

    fn delivery_log(&self) -> impl Future<Output = Result<Vec<DeliveryLogEntry>, StoreError>> + Send;

    /// The `send_custom_push` stored procedure.
    fn send_custom_push(
        &self,
        request: CustomPushRequest,
    ) -> impl Future<Output = Result<CustomPushResponse, StoreError>> + Send;

    fn insert_ride(
        &self,
        ride: NewExtraRide,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<ExtraRide, StoreError>> + Send;

    fn review_ride(
        &self,
        id: Uuid,
        review: RideReview,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<ExtraRide, StoreError>> + Send;
}
