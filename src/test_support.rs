use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use uuid::Uuid;

use crate::ports::push::{PushSender, SendError};
use crate::ports::store::{DataStore, LogOutcome, StoreError};
use crate::ports::time::TimeProvider;
use crate::store::MemoryStore;
use crate::types::push::{
    CustomPushRequest, CustomPushResponse, DeliveryLogEntry, DeliveryTier, EncryptionKeys,
    NewLogEntry, NewSubscription, PushSubscription, RecipientClass,
};
use crate::types::rides::{ExtraRide, NewExtraRide, RideReview};

pub(crate) const P256DH: &str =
    "BAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8gISIjJCUmJygpKissLS4vMDEyMzQ1Njc4OTo7PD0-P0A";
pub(crate) const AUTH: &str = "AAECAwQFBgcICQoLDA0ODw";

pub(crate) fn at(raw: &str) -> OffsetDateTime {
    OffsetDateTime::parse(raw, &Rfc3339).expect("parse time")
}

#[derive(Clone)]
pub(crate) struct FixedTime(Arc<Mutex<OffsetDateTime>>);

impl FixedTime {
    pub(crate) fn at(raw: &str) -> Self {
        Self(Arc::new(Mutex::new(at(raw))))
    }

    pub(crate) fn set(&self, raw: &str) {
        *self.0.lock().expect("time lock") = at(raw);
    }
}

impl TimeProvider for FixedTime {
    fn now(&self) -> OffsetDateTime {
        *self.0.lock().expect("time lock")
    }
}

pub(crate) async fn seed_subscription(
    store: &MemoryStore,
    recipient_id: &str,
    recipient_class: RecipientClass,
    endpoint: &str,
) -> PushSubscription {
    store
        .upsert_subscription(
            NewSubscription {
                recipient_id: recipient_id.to_string(),
                recipient_class,
                endpoint: endpoint.to_string(),
                keys: EncryptionKeys {
                    p256dh: P256DH.to_string(),
                    auth: AUTH.to_string(),
                },
            },
            at("2025-03-01T08:00:00Z"),
        )
        .await
        .expect("seed subscription")
}

/// Push sender that records deliveries and can be scripted per endpoint.
#[derive(Clone, Default)]
pub(crate) struct RecordingSender {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    failures: Arc<Mutex<HashMap<String, SendError>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    fail_all: Arc<Mutex<Option<SendError>>>,
}

impl RecordingSender {
    pub(crate) fn fail(&self, endpoint: &str, error: SendError) {
        self.failures
            .lock()
            .expect("failures lock")
            .insert(endpoint.to_string(), error);
    }

    pub(crate) fn fail_everything(&self, error: SendError) {
        *self.fail_all.lock().expect("fail_all lock") = Some(error);
    }

    pub(crate) fn delay(&self, endpoint: &str, delay: Duration) {
        self.delays
            .lock()
            .expect("delays lock")
            .insert(endpoint.to_string(), delay);
    }

    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("sent lock").clone()
    }
}

impl PushSender for RecordingSender {
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<(), SendError>> + Send + 'a>>
    where
        Self: 'a;

    fn send<'a>(&'a self, subscription: &'a PushSubscription, message: &'a str) -> Self::Fut<'a> {
        let endpoint = subscription.endpoint.clone();
        let delay = self.delays.lock().expect("delays lock").get(&endpoint).copied();
        let failure = self
            .fail_all
            .lock()
            .expect("fail_all lock")
            .clone()
            .or_else(|| self.failures.lock().expect("failures lock").get(&endpoint).cloned());
        let sent = Arc::clone(&self.sent);
        let message = message.to_string();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(error) = failure {
                return Err(error);
            }
            sent.lock().expect("sent lock").push((endpoint, message));
            Ok(())
        })
    }
}

/// Reads go to the wrapped store; every write fails as if the store were down.
#[derive(Clone, Default)]
pub(crate) struct ReadOnlyStore(pub(crate) MemoryStore);

fn writes_disabled<T>() -> std::future::Ready<Result<T, StoreError>> {
    std::future::ready(Err(StoreError::Unavailable("writes disabled".to_string())))
}

impl DataStore for ReadOnlyStore {
    fn upsert_subscription(
        &self,
        _subscription: NewSubscription,
        _now: OffsetDateTime,
    ) -> impl Future<Output = Result<PushSubscription, StoreError>> + Send {
        writes_disabled()
    }

    fn active_subscriptions(
        &self,
    ) -> impl Future<Output = Result<Vec<PushSubscription>, StoreError>> + Send {
        self.0.active_subscriptions()
    }

    fn deactivate_subscription(
        &self,
        _id: Uuid,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        writes_disabled()
    }

    fn deactivate_endpoint(
        &self,
        _endpoint: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        writes_disabled()
    }

    fn touch_subscription(
        &self,
        _id: Uuid,
        _now: OffsetDateTime,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        writes_disabled()
    }

    fn insert_log(
        &self,
        _entry: NewLogEntry,
        _now: OffsetDateTime,
    ) -> impl Future<Output = Result<DeliveryLogEntry, StoreError>> + Send {
        writes_disabled()
    }

    fn finish_log(
        &self,
        _id: Uuid,
        _tier: DeliveryTier,
        _outcome: LogOutcome,
        _now: OffsetDateTime,
    ) -> impl Future<Output = Result<DeliveryLogEntry, StoreError>> + Send {
        writes_disabled()
    }

    fn delivery_log(&self) -> impl Future<Output = Result<Vec<DeliveryLogEntry>, StoreError>> + Send {
        self.0.delivery_log()
    }

    fn send_custom_push(
        &self,
        request: CustomPushRequest,
    ) -> impl Future<Output = Result<CustomPushResponse, StoreError>> + Send {
        self.0.send_custom_push(request)
    }

    fn insert_ride(
        &self,
        _ride: NewExtraRide,
        _now: OffsetDateTime,
    ) -> impl Future<Output = Result<ExtraRide, StoreError>> + Send {
        writes_disabled()
    }

    fn review_ride(
        &self,
        _id: Uuid,
        _review: RideReview,
        _now: OffsetDateTime,
    ) -> impl Future<Output = Result<ExtraRide, StoreError>> + Send {
        writes_disabled()
    }
}
