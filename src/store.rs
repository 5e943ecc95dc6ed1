use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use futures::future::BoxFuture;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ports::store::{DataStore, LogOutcome, StoreError};
use crate::config::DEFAULT_LOG_RETENTION;
use crate::types::push::{
    CustomPushRequest, CustomPushResponse, DeliveryLogEntry, DeliveryStatus, DeliveryTier,
    NewLogEntry, NewSubscription, PushSubscription, RecipientClass,
};
use crate::types::rides::{ExtraRide, NewExtraRide, RideReview, RideStatus};

/// Server-side implementation of the `send_custom_push` procedure.
pub trait CustomPushProcedure: Send + Sync {
    fn call(
        &self,
        request: CustomPushRequest,
        targets: Vec<PushSubscription>,
    ) -> BoxFuture<'static, Result<CustomPushResponse, StoreError>>;
}

#[derive(Default)]
struct Tables {
    subscriptions: Vec<PushSubscription>,
    log: VecDeque<DeliveryLogEntry>,
    rides: Vec<ExtraRide>,
}

/// In-process stand-in for the hosted data store. Every clone shares the
/// same tables and nothing survives a restart.
///
/// The delivery log keeps at most `log_retention` rows. Once full, the oldest
/// finished rows make room; `pending` rows are never evicted.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    procedure: Arc<RwLock<Option<Arc<dyn CustomPushProcedure>>>>,
    log_retention: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_log_retention(DEFAULT_LOG_RETENTION)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_retention(log_retention: usize) -> Self {
        Self {
            tables: Arc::default(),
            procedure: Arc::default(),
            log_retention: log_retention.max(1),
        }
    }

    pub fn install_custom_push(&self, procedure: Arc<dyn CustomPushProcedure>) {
        if let Ok(mut slot) = self.procedure.write() {
            *slot = Some(procedure);
        }
    }

    pub fn subscriptions(&self) -> Result<Vec<PushSubscription>, StoreError> {
        Ok(self.tables()?.subscriptions.clone())
    }

    pub fn rides(&self) -> Result<Vec<ExtraRide>, StoreError> {
        Ok(self.tables()?.rides.clone())
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn upsert(
        &self,
        subscription: NewSubscription,
        now: OffsetDateTime,
    ) -> Result<PushSubscription, StoreError> {
        let mut tables = self.tables()?;

        if let Some(existing) = tables
            .subscriptions
            .iter_mut()
            .find(|row| row.endpoint == subscription.endpoint)
        {
            existing.recipient_id = subscription.recipient_id;
            existing.recipient_class = subscription.recipient_class;
            existing.keys = subscription.keys;
            existing.active = true;
            existing.last_used_at = now;
            return Ok(existing.clone());
        }

        let row = PushSubscription {
            id: Uuid::new_v4(),
            recipient_id: subscription.recipient_id,
            recipient_class: subscription.recipient_class,
            endpoint: subscription.endpoint,
            keys: subscription.keys,
            active: true,
            created_at: now,
            last_used_at: now,
        };
        tables.subscriptions.push(row.clone());
        Ok(row)
    }

    fn set_inactive(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let row = tables
            .subscriptions
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(StoreError::NotFound(id))?;
        row.active = false;
        Ok(())
    }

    fn set_endpoint_inactive(&self, endpoint: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        match tables
            .subscriptions
            .iter_mut()
            .find(|row| row.endpoint == endpoint && row.active)
        {
            Some(row) => {
                row.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn touch(&self, id: Uuid, now: OffsetDateTime) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let row = tables
            .subscriptions
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(StoreError::NotFound(id))?;
        row.last_used_at = now;
        Ok(())
    }

    fn append_log(
        &self,
        entry: NewLogEntry,
        now: OffsetDateTime,
    ) -> Result<DeliveryLogEntry, StoreError> {
        let mut tables = self.tables()?;
        let row = DeliveryLogEntry {
            id: Uuid::new_v4(),
            recipient_id: entry.recipient_id,
            recipient_class: entry.recipient_class,
            title: entry.title,
            body: entry.body,
            kind: entry.kind,
            status: DeliveryStatus::Pending,
            created_at: now,
            sent_at: None,
            error_message: None,
            metadata: entry.metadata,
        };
        if tables.log.len() >= self.log_retention
            && let Some(oldest) = tables.log.iter().position(|row| row.status.is_terminal())
        {
            tables.log.remove(oldest);
        }
        tables.log.push_back(row.clone());
        Ok(row)
    }

    fn transition_log(
        &self,
        id: Uuid,
        tier: DeliveryTier,
        outcome: LogOutcome,
        now: OffsetDateTime,
    ) -> Result<DeliveryLogEntry, StoreError> {
        let mut tables = self.tables()?;
        let row = tables
            .log
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if row.status.is_terminal() {
            return Err(StoreError::AlreadyTerminal(id));
        }
        row.metadata.tier = tier;
        match outcome {
            LogOutcome::Sent => {
                row.status = DeliveryStatus::Sent;
                row.sent_at = Some(now);
            }
            LogOutcome::Failed(reason) => {
                row.status = DeliveryStatus::Failed;
                row.error_message = Some(reason);
            }
        }
        Ok(row.clone())
    }

    fn create_ride(&self, ride: NewExtraRide, now: OffsetDateTime) -> Result<ExtraRide, StoreError> {
        let mut tables = self.tables()?;
        let row = ExtraRide {
            id: Uuid::new_v4(),
            driver_id: ride.driver_id,
            driver_name: ride.driver_name,
            date: ride.date,
            note: ride.note,
            status: RideStatus::Pending,
            requested_at: now,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
        };
        tables.rides.push(row.clone());
        Ok(row)
    }

    fn decide_ride(
        &self,
        id: Uuid,
        review: RideReview,
        now: OffsetDateTime,
    ) -> Result<ExtraRide, StoreError> {
        let mut tables = self.tables()?;
        let row = tables
            .rides
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if row.status != RideStatus::Pending {
            return Err(StoreError::AlreadyReviewed(id));
        }
        row.status = review.decision.into();
        row.reviewed_by = Some(review.reviewed_by);
        row.reviewed_at = Some(now);
        row.review_notes = review.notes;
        Ok(row.clone())
    }

    fn procedure_targets(&self, request: &CustomPushRequest) -> Result<Vec<PushSubscription>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .subscriptions
            .iter()
            .filter(|row| row.active)
            .filter(|row| match request.target_type.as_str() {
                "drivers" => row.recipient_class == RecipientClass::Driver,
                "admins" => row.recipient_class == RecipientClass::Admin,
                "users" => request.target_users.contains(&row.recipient_id),
                _ => true,
            })
            .cloned()
            .collect())
    }
}

impl DataStore for MemoryStore {
    fn upsert_subscription(
        &self,
        subscription: NewSubscription,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<PushSubscription, StoreError>> + Send {
        std::future::ready(self.upsert(subscription, now))
    }

    fn active_subscriptions(
        &self,
    ) -> impl Future<Output = Result<Vec<PushSubscription>, StoreError>> + Send {
        let result: Result<Vec<PushSubscription>, StoreError> = self.tables().map(|tables| {
            tables
                .subscriptions
                .iter()
                .filter(|row| row.active)
                .cloned()
                .collect()
        });
        std::future::ready(result)
    }

    fn deactivate_subscription(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        std::future::ready(self.set_inactive(id))
    }

    fn deactivate_endpoint(
        &self,
        endpoint: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        std::future::ready(self.set_endpoint_inactive(endpoint))
    }

    fn touch_subscription(
        &self,
        id: Uuid,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        std::future::ready(self.touch(id, now))
    }

    fn insert_log(
        &self,
        entry: NewLogEntry,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<DeliveryLogEntry, StoreError>> + Send {
        std::future::ready(self.append_log(entry, now))
    }

    fn finish_log(
        &self,
        id: Uuid,
        tier: DeliveryTier,
        outcome: LogOutcome,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<DeliveryLogEntry, StoreError>> + Send {
        std::future::ready(self.transition_log(id, tier, outcome, now))
    }

    fn delivery_log(&self) -> impl Future<Output = Result<Vec<DeliveryLogEntry>, StoreError>> + Send {
        std::future::ready(self.tables().map(|tables| tables.log.iter().cloned().collect()))
    }

    fn send_custom_push(
        &self,
        request: CustomPushRequest,
    ) -> impl Future<Output = Result<CustomPushResponse, StoreError>> + Send {
        let procedure = self
            .procedure
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().map(Arc::clone));
        let targets = self.procedure_targets(&request);
        async move {
            let procedure = procedure.ok_or_else(|| {
                StoreError::RpcUnavailable("send_custom_push is not installed".to_string())
            })?;
            procedure.call(request, targets?).await
        }
    }

    fn insert_ride(
        &self,
        ride: NewExtraRide,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<ExtraRide, StoreError>> + Send {
        std::future::ready(self.create_ride(ride, now))
    }

    fn review_ride(
        &self,
        id: Uuid,
        review: RideReview,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<ExtraRide, StoreError>> + Send {
        std::future::ready(self.decide_ride(id, review, now))
    }
}
