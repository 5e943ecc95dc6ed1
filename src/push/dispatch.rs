use std::time::Duration;

use futures::future::join_all;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::DEFAULT_SEND_TIMEOUT_SECS;
use crate::ports::push::{PushSender, SendError};
use crate::ports::store::{DataStore, LogOutcome, StoreError};
use crate::ports::time::TimeProvider;
use crate::push::presenter::Present;
use crate::types::push::{
    CustomPushRequest, DeliveryMetadata, DeliveryTier, DispatchResult, NewLogEntry,
    NotificationPayload, PushSubscription, TargetSelector,
};

const NOT_SHOWN_LOCALLY: &str = "notification was not shown locally";
const PROCEDURE_REPORTED_FAILURE: &str = "store procedure reported a failed delivery";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TierOutcome {
    sent: usize,
    failed: usize,
}

/// Resolves targets and pushes a payload through the delivery tiers.
///
/// Tiers run in order and the next one starts only when the current one
/// delivered nothing:
/// 1. Web Push from this process (skipped when no sender is configured).
/// 2. The store's `send_custom_push` procedure.
/// 3. The initiator's own presenter, when one is given. This only reaches
///    the initiating device.
///
/// Every resolved subscription gets one `pending` log row before the first
/// tier runs. The row is finished once, by the tier that handled the
/// dispatch, or as failed by the last tier tried.
#[derive(Debug, Clone)]
pub struct Dispatcher<S, D, T> {
    sender: Option<S>,
    store: D,
    time: T,
    send_timeout: Duration,
}

impl<S, D, T> Dispatcher<S, D, T>
where
    S: PushSender,
    D: DataStore,
    T: TimeProvider,
{
    pub fn new(sender: Option<S>, store: D, time: T) -> Self {
        Self {
            sender,
            store,
            time,
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub async fn dispatch(
        &self,
        payload: &NotificationPayload,
        target: &TargetSelector,
        initiator: Option<&dyn Present>,
    ) -> DispatchResult {
        let span = tracing::info_span!(
            "dispatch",
            kind = payload.kind.as_str(),
            target = target.target_type()
        );
        self.dispatch_tiers(payload, target, initiator)
            .instrument(span)
            .await
    }

    async fn dispatch_tiers(
        &self,
        payload: &NotificationPayload,
        target: &TargetSelector,
        initiator: Option<&dyn Present>,
    ) -> DispatchResult {
        let targets = match self.resolve(target).await {
            Ok(targets) => targets,
            Err(err) => {
                tracing::error!(%err, "failed to resolve push targets");
                return DispatchResult {
                    success: false,
                    sent: 0,
                    failed: 0,
                    total: 0,
                    method: None,
                };
            }
        };
        if targets.is_empty() {
            tracing::info!("no active subscriptions match target");
            return DispatchResult::nobody();
        }
        let total = targets.len();

        let first_tier = match self.sender {
            Some(_) => DeliveryTier::ServerPush,
            None => DeliveryTier::StoreRpc,
        };
        let log_ids = self.open_logs(payload, &targets, first_tier).await;

        match self.sender.as_ref() {
            Some(sender) => {
                let results = self.server_push(sender, payload, &targets, &log_ids).await;
                let sent = results.iter().filter(|result| result.is_ok()).count();
                if sent > 0 {
                    for (log_id, result) in log_ids.iter().zip(results) {
                        let outcome = match result {
                            Ok(()) => LogOutcome::Sent,
                            Err(err) => LogOutcome::Failed(err.to_string()),
                        };
                        self.close_log(*log_id, DeliveryTier::ServerPush, outcome)
                            .await;
                    }
                    let outcome = TierOutcome {
                        sent,
                        failed: total - sent,
                    };
                    return finished(DeliveryTier::ServerPush, outcome, total);
                }
                tracing::warn!(failed = total, "web push tier delivered nothing");
            }
            None => tracing::warn!("web push tier unavailable: no VAPID credentials"),
        }

        let mut reason = match self.store_rpc(payload, target).await {
            Ok(outcome) if outcome.sent > 0 => {
                // Only counts come back, so rows are credited in resolution order.
                for (index, log_id) in log_ids.iter().enumerate() {
                    let row = if index < outcome.sent {
                        LogOutcome::Sent
                    } else {
                        LogOutcome::Failed(PROCEDURE_REPORTED_FAILURE.to_string())
                    };
                    self.close_log(*log_id, DeliveryTier::StoreRpc, row).await;
                }
                return finished(DeliveryTier::StoreRpc, outcome, total);
            }
            Ok(outcome) => {
                tracing::warn!(failed = outcome.failed, "store procedure tier delivered nothing");
                PROCEDURE_REPORTED_FAILURE.to_string()
            }
            Err(err) => {
                tracing::warn!(%err, "store procedure tier unavailable");
                err.to_string()
            }
        };
        let mut last_tier = DeliveryTier::StoreRpc;

        if let Some(initiator) = initiator {
            let shown = self.local(initiator, payload, &targets, &log_ids);
            let sent = shown.iter().filter(|shown| **shown).count();
            if sent > 0 {
                for (log_id, shown) in log_ids.iter().zip(shown) {
                    let outcome = if shown {
                        LogOutcome::Sent
                    } else {
                        LogOutcome::Failed(NOT_SHOWN_LOCALLY.to_string())
                    };
                    self.close_log(*log_id, DeliveryTier::Local, outcome).await;
                }
                let outcome = TierOutcome {
                    sent,
                    failed: total - sent,
                };
                return finished(DeliveryTier::Local, outcome, total);
            }
            tracing::warn!("local tier showed nothing");
            last_tier = DeliveryTier::Local;
            reason = NOT_SHOWN_LOCALLY.to_string();
        }

        for log_id in &log_ids {
            self.close_log(*log_id, last_tier, LogOutcome::Failed(reason.clone()))
                .await;
        }
        tracing::error!(total, "all delivery tiers failed");
        DispatchResult {
            success: false,
            sent: 0,
            failed: total,
            total,
            method: None,
        }
    }

    /// Every dispatch reads the current active rows; nothing is cached.
    async fn resolve(&self, target: &TargetSelector) -> Result<Vec<PushSubscription>, StoreError> {
        let active = self.store.active_subscriptions().await?;
        Ok(active
            .into_iter()
            .filter(|subscription| target.matches(subscription))
            .collect())
    }

    async fn server_push(
        &self,
        sender: &S,
        payload: &NotificationPayload,
        targets: &[PushSubscription],
        log_ids: &[Option<Uuid>],
    ) -> Vec<Result<(), SendError>> {
        let attempts = targets
            .iter()
            .zip(log_ids)
            .map(|(subscription, log_id)| self.push_one(sender, payload, subscription, *log_id));
        join_all(attempts).await
    }

    async fn push_one(
        &self,
        sender: &S,
        payload: &NotificationPayload,
        subscription: &PushSubscription,
        log_id: Option<Uuid>,
    ) -> Result<(), SendError> {
        let notification_id = log_id.unwrap_or_else(Uuid::new_v4);
        let wire = payload.render(&subscription.recipient_id, notification_id, self.time.now());
        let result = match serde_json::to_string(&wire) {
            Ok(message) => {
                match tokio::time::timeout(self.send_timeout, sender.send(subscription, &message))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(SendError::Timeout(self.send_timeout)),
                }
            }
            Err(err) => Err(SendError::Transport(err.to_string())),
        };

        match &result {
            Ok(()) => {
                if let Err(err) = self
                    .store
                    .touch_subscription(subscription.id, self.time.now())
                    .await
                {
                    tracing::warn!(%err, subscription_id = %subscription.id, "failed to touch subscription");
                }
            }
            Err(err) => {
                tracing::warn!(
                    %err,
                    recipient_id = %subscription.recipient_id,
                    endpoint = %endpoint_fingerprint(&subscription.endpoint),
                    "push delivery failed"
                );
                if err.is_permanent() {
                    match self.store.deactivate_subscription(subscription.id).await {
                        Ok(()) => tracing::info!(
                            subscription_id = %subscription.id,
                            "subscription deactivated after permanent rejection"
                        ),
                        Err(store_err) => tracing::error!(
                            err = %store_err,
                            subscription_id = %subscription.id,
                            "failed to deactivate subscription"
                        ),
                    }
                }
            }
        }
        result
    }

    async fn store_rpc(
        &self,
        payload: &NotificationPayload,
        target: &TargetSelector,
    ) -> Result<TierOutcome, StoreError> {
        let response = self
            .store
            .send_custom_push(CustomPushRequest {
                title: payload.title.clone(),
                message: payload.body.clone(),
                target_users: target.explicit_recipients().to_vec(),
                target_type: target.target_type().to_string(),
            })
            .await?;
        Ok(TierOutcome {
            sent: response.sent_count,
            failed: response.failed_count,
        })
    }

    /// Shows one payload per target on the initiator. Untagged payloads share
    /// a tag so the initiating browser folds them into one notification.
    fn local(
        &self,
        initiator: &dyn Present,
        payload: &NotificationPayload,
        targets: &[PushSubscription],
        log_ids: &[Option<Uuid>],
    ) -> Vec<bool> {
        let notification_ids: Vec<Uuid> = log_ids
            .iter()
            .map(|log_id| log_id.unwrap_or_else(Uuid::new_v4))
            .collect();
        let shared_tag = payload.tag.clone().or_else(|| {
            notification_ids
                .first()
                .map(|first| format!("{}-{first}", payload.kind.as_str()))
        });

        targets
            .iter()
            .zip(notification_ids)
            .map(|(subscription, notification_id)| {
                let mut wire =
                    payload.render(&subscription.recipient_id, notification_id, self.time.now());
                wire.tag = shared_tag.clone();
                initiator.present(&wire)
            })
            .collect()
    }

    async fn open_logs(
        &self,
        payload: &NotificationPayload,
        targets: &[PushSubscription],
        tier: DeliveryTier,
    ) -> Vec<Option<Uuid>> {
        let mut log_ids = Vec::with_capacity(targets.len());
        for subscription in targets {
            log_ids.push(self.open_log(payload, subscription, tier).await);
        }
        log_ids
    }

    async fn open_log(
        &self,
        payload: &NotificationPayload,
        subscription: &PushSubscription,
        tier: DeliveryTier,
    ) -> Option<Uuid> {
        let entry = NewLogEntry {
            recipient_id: subscription.recipient_id.clone(),
            recipient_class: subscription.recipient_class,
            title: payload.title.clone(),
            body: payload.body.clone(),
            kind: payload.kind,
            metadata: DeliveryMetadata {
                tier,
                subscription_id: Some(subscription.id),
                endpoint_fingerprint: Some(endpoint_fingerprint(&subscription.endpoint)),
            },
        };
        match self.store.insert_log(entry, self.time.now()).await {
            Ok(row) => Some(row.id),
            Err(err) => {
                tracing::error!(%err, "failed to open delivery log entry");
                None
            }
        }
    }

    async fn close_log(&self, log_id: Option<Uuid>, tier: DeliveryTier, outcome: LogOutcome) {
        let Some(log_id) = log_id else {
            return;
        };
        if let Err(err) = self
            .store
            .finish_log(log_id, tier, outcome, self.time.now())
            .await
        {
            tracing::error!(%err, %log_id, "failed to finish delivery log entry");
        }
    }
}

fn finished(tier: DeliveryTier, outcome: TierOutcome, total: usize) -> DispatchResult {
    tracing::info!(
        tier = tier.as_str(),
        sent = outcome.sent,
        failed = outcome.failed,
        "dispatch finished"
    );
    DispatchResult {
        success: true,
        sent: outcome.sent,
        failed: outcome.failed,
        total,
        method: Some(tier),
    }
}

/// Push service host, safe to log and store.
pub(crate) fn endpoint_fingerprint(endpoint: &str) -> String {
    url::Url::parse(endpoint)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| "invalid-endpoint".to_string())
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::ports::store::StoreError;
    use crate::push::composer::Composer;
    use crate::store::{CustomPushProcedure, MemoryStore};
    use crate::test_support::{FixedTime, RecordingSender, seed_subscription};
    use crate::types::push::{
        CustomPushResponse, DeliveryStatus, NotificationEvent, NotificationKind, RecipientClass,
        WirePayload,
    };
    use futures::future::BoxFuture;
    use std::sync::{Arc, Mutex};

    struct FixedProcedure(Result<CustomPushResponse, StoreError>);

    impl CustomPushProcedure for FixedProcedure {
        fn call(
            &self,
            _request: CustomPushRequest,
            _targets: Vec<PushSubscription>,
        ) -> BoxFuture<'static, Result<CustomPushResponse, StoreError>> {
            let result = self.0.clone();
            Box::pin(async move { result })
        }
    }

    #[derive(Default)]
    struct RecordingPresenter {
        shown: Mutex<Vec<WirePayload>>,
    }

    impl Present for RecordingPresenter {
        fn present(&self, payload: &WirePayload) -> bool {
            self.shown.lock().expect("shown lock").push(payload.clone());
            true
        }
    }

    fn custom(title: &str, body: &str) -> NotificationPayload {
        Composer::new("/icon.png", "/badge.png")
            .compose(&NotificationEvent::CustomMessage {
                title: Some(title.to_string()),
                body: body.to_string(),
            })
            .expect("compose")
    }

    fn dispatcher(
        sender: Option<RecordingSender>,
        store: &MemoryStore,
    ) -> Dispatcher<RecordingSender, MemoryStore, FixedTime> {
        Dispatcher::new(sender, store.clone(), FixedTime::at("2025-03-10T12:00:00Z"))
    }

    async fn seed_fleet(store: &MemoryStore) {
        seed_subscription(store, "1", RecipientClass::Driver, "https://push.example/d1").await;
        seed_subscription(store, "2", RecipientClass::Driver, "https://push.example/d2").await;
        seed_subscription(store, "admin", RecipientClass::Admin, "https://push.example/a1").await;
    }

    #[tokio::test]
    async fn dispatch__should_succeed_with_zero_for_empty_explicit_list() {
        // Given
        let store = MemoryStore::new();
        seed_fleet(&store).await;
        let sender = RecordingSender::default();

        // When
        let result = dispatcher(Some(sender.clone()), &store)
            .dispatch(
                &custom("X", "hi"),
                &TargetSelector::ExplicitRecipients {
                    recipients: Vec::new(),
                },
                None,
            )
            .await;

        // Then
        assert_eq!(result, DispatchResult::nobody());
        assert!(result.success);
        assert!(sender.sent().is_empty());
        assert!(store.delivery_log().await.expect("log").is_empty());
    }

    #[tokio::test]
    async fn dispatch__should_deliver_to_drivers_only_and_log_sent_rows() {
        // Given
        let store = MemoryStore::new();
        seed_fleet(&store).await;
        let sender = RecordingSender::default();

        // When
        let result = dispatcher(Some(sender.clone()), &store)
            .dispatch(&custom("X", "hi"), &TargetSelector::DriversOnly, None)
            .await;

        // Then
        assert_eq!(result.total, 2);
        assert_eq!(result.sent, 2);
        assert_eq!(result.failed, 0);
        assert_eq!(result.method, Some(DeliveryTier::ServerPush));
        let mut endpoints: Vec<String> = sender.sent().into_iter().map(|(e, _)| e).collect();
        endpoints.sort();
        assert_eq!(endpoints, vec!["https://push.example/d1", "https://push.example/d2"]);

        let log = store.delivery_log().await.expect("log");
        assert_eq!(log.len(), 2);
        for entry in &log {
            assert_eq!(entry.status, DeliveryStatus::Sent);
            assert_eq!(entry.kind, NotificationKind::CustomMessage);
            assert_eq!(entry.metadata.tier, DeliveryTier::ServerPush);
            assert_eq!(entry.metadata.endpoint_fingerprint.as_deref(), Some("push.example"));
        }
    }

    #[tokio::test]
    async fn dispatch__should_send_wire_payload_with_log_id() {
        // Given
        let store = MemoryStore::new();
        seed_subscription(&store, "1", RecipientClass::Driver, "https://push.example/d1").await;
        let sender = RecordingSender::default();

        // When
        dispatcher(Some(sender.clone()), &store)
            .dispatch(&custom("X", "hi"), &TargetSelector::All, None)
            .await;

        // Then
        let (_, message) = sender.sent().remove(0);
        let wire: WirePayload = serde_json::from_str(&message).expect("wire payload");
        let log = store.delivery_log().await.expect("log");
        assert_eq!(wire.title, "X");
        assert_eq!(wire.data.recipient_id, "1");
        assert_eq!(wire.data.notification_id, log[0].id);
        assert_eq!(wire.data.kind, "custom_message");
    }

    #[tokio::test]
    async fn dispatch__should_isolate_failing_recipient() {
        // Given
        let store = MemoryStore::new();
        for index in 0..4 {
            seed_subscription(
                &store,
                &index.to_string(),
                RecipientClass::Driver,
                &format!("https://push.example/{index}"),
            )
            .await;
        }
        seed_subscription(&store, "bad", RecipientClass::Driver, "not a url").await;
        let sender = RecordingSender::default();
        sender.fail("not a url", SendError::InvalidEndpoint);

        // When
        let result = dispatcher(Some(sender.clone()), &store)
            .dispatch(&custom("X", "hi"), &TargetSelector::All, None)
            .await;

        // Then
        assert_eq!(result.total, 5);
        assert_eq!(result.sent, 4);
        assert_eq!(result.failed, 1);
        let log = store.delivery_log().await.expect("log");
        let failed: Vec<_> = log
            .iter()
            .filter(|entry| entry.status == DeliveryStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].recipient_id, "bad");
        assert_eq!(
            failed[0].metadata.endpoint_fingerprint.as_deref(),
            Some("invalid-endpoint")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch__should_fan_out_concurrently() {
        // Given
        let store = MemoryStore::new();
        let sender = RecordingSender::default();
        for index in 0..5 {
            let endpoint = format!("https://push.example/{index}");
            seed_subscription(&store, &index.to_string(), RecipientClass::Driver, &endpoint).await;
            sender.delay(&endpoint, Duration::from_secs(1));
        }
        sender.fail("https://push.example/4", SendError::Rejected("bad".to_string()));
        let started = tokio::time::Instant::now();

        // When
        let result = dispatcher(Some(sender.clone()), &store)
            .dispatch(&custom("X", "hi"), &TargetSelector::All, None)
            .await;

        // Then
        assert_eq!(result.sent, 4);
        assert_eq!(result.failed, 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch__should_time_out_stalled_endpoint() {
        // Given
        let store = MemoryStore::new();
        seed_subscription(&store, "1", RecipientClass::Driver, "https://push.example/slow").await;
        seed_subscription(&store, "2", RecipientClass::Driver, "https://push.example/fast").await;
        let sender = RecordingSender::default();
        sender.delay("https://push.example/slow", Duration::from_secs(60));
        let started = tokio::time::Instant::now();

        // When
        let result = dispatcher(Some(sender.clone()), &store)
            .with_send_timeout(Duration::from_secs(10))
            .dispatch(&custom("X", "hi"), &TargetSelector::All, None)
            .await;

        // Then
        assert_eq!(result.sent, 1);
        assert_eq!(result.failed, 1);
        assert!(started.elapsed() < Duration::from_secs(11));
        let log = store.delivery_log().await.expect("log");
        let failed = log
            .iter()
            .find(|entry| entry.status == DeliveryStatus::Failed)
            .expect("failed entry");
        assert!(
            failed
                .error_message
                .as_deref()
                .expect("error message")
                .contains("timed out")
        );
    }

    #[tokio::test]
    async fn dispatch__should_deactivate_gone_subscription() {
        // Given
        let store = MemoryStore::new();
        seed_fleet(&store).await;
        let sender = RecordingSender::default();
        sender.fail("https://push.example/d2", SendError::Gone);
        let dispatcher = dispatcher(Some(sender.clone()), &store);

        // When
        dispatcher
            .dispatch(&custom("X", "first"), &TargetSelector::All, None)
            .await;
        let second = dispatcher
            .dispatch(&custom("X", "second"), &TargetSelector::All, None)
            .await;

        // Then
        let active = store.active_subscriptions().await.expect("active");
        assert!(active.iter().all(|row| row.endpoint != "https://push.example/d2"));
        assert_eq!(second.total, 2);
        assert_eq!(second.sent, 2);
    }

    #[tokio::test]
    async fn dispatch__should_keep_subscription_after_transient_failure() {
        // Given
        let store = MemoryStore::new();
        seed_fleet(&store).await;
        let sender = RecordingSender::default();
        sender.fail(
            "https://push.example/d2",
            SendError::Transport("connection reset".to_string()),
        );

        // When
        dispatcher(Some(sender), &store)
            .dispatch(&custom("X", "hi"), &TargetSelector::All, None)
            .await;

        // Then
        assert_eq!(store.active_subscriptions().await.expect("active").len(), 3);
    }

    #[tokio::test]
    async fn dispatch__should_fall_back_to_store_procedure() {
        // Given
        let store = MemoryStore::new();
        seed_fleet(&store).await;
        store.install_custom_push(Arc::new(FixedProcedure(Ok(CustomPushResponse {
            sent_count: 3,
            failed_count: 0,
        }))));
        let sender = RecordingSender::default();
        sender.fail_everything(SendError::Transport("offline".to_string()));
        let presenter = RecordingPresenter::default();

        // When
        let result = dispatcher(Some(sender), &store)
            .dispatch(&custom("X", "hi"), &TargetSelector::All, Some(&presenter))
            .await;

        // Then
        assert!(result.success);
        assert_eq!(result.sent, 3);
        assert_eq!(result.method, Some(DeliveryTier::StoreRpc));
        assert!(presenter.shown.lock().expect("shown lock").is_empty());
        let log = store.delivery_log().await.expect("log");
        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|entry| entry.status == DeliveryStatus::Sent
            && entry.metadata.tier == DeliveryTier::StoreRpc));
    }

    #[tokio::test]
    async fn dispatch__should_log_store_procedure_deliveries_without_web_push() {
        // Given
        let store = MemoryStore::new();
        seed_fleet(&store).await;
        store.install_custom_push(Arc::new(FixedProcedure(Ok(CustomPushResponse {
            sent_count: 1,
            failed_count: 1,
        }))));

        // When
        let result = dispatcher(None, &store)
            .dispatch(&custom("X", "hi"), &TargetSelector::DriversOnly, None)
            .await;

        // Then
        assert_eq!(result.method, Some(DeliveryTier::StoreRpc));
        assert_eq!(result.total, 2);
        let log = store.delivery_log().await.expect("log");
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|entry| entry.metadata.tier == DeliveryTier::StoreRpc));
        assert_eq!(
            log.iter().filter(|entry| entry.status == DeliveryStatus::Sent).count(),
            1
        );
        assert_eq!(
            log.iter().filter(|entry| entry.status == DeliveryStatus::Failed).count(),
            1
        );
    }

    #[tokio::test]
    async fn dispatch__should_log_failed_rows_when_no_tier_is_available() {
        // Given
        let store = MemoryStore::new();
        seed_subscription(&store, "1", RecipientClass::Driver, "https://push.example/d1").await;
        seed_subscription(&store, "2", RecipientClass::Driver, "https://push.example/d2").await;

        // When
        let result = dispatcher(None, &store)
            .dispatch(&custom("X", "hi"), &TargetSelector::All, None)
            .await;

        // Then
        assert!(!result.success);
        assert_eq!(result.failed, 2);
        assert_eq!(result.method, None);
        let log = store.delivery_log().await.expect("log");
        assert_eq!(log.len(), result.failed);
        for entry in &log {
            assert_eq!(entry.status, DeliveryStatus::Failed);
            assert_eq!(entry.metadata.tier, DeliveryTier::StoreRpc);
            assert!(
                entry
                    .error_message
                    .as_deref()
                    .expect("error message")
                    .contains("send_custom_push is not installed")
            );
        }
    }

    #[tokio::test]
    async fn dispatch__should_fall_through_to_local_tier() {
        // Given
        let store = MemoryStore::new();
        seed_fleet(&store).await;
        store.install_custom_push(Arc::new(FixedProcedure(Ok(CustomPushResponse {
            sent_count: 0,
            failed_count: 3,
        }))));
        let sender = RecordingSender::default();
        sender.fail_everything(SendError::Rejected("unauthorized".to_string()));
        let presenter = RecordingPresenter::default();

        // When
        let result = dispatcher(Some(sender), &store)
            .dispatch(&custom("X", "hi"), &TargetSelector::DriversOnly, Some(&presenter))
            .await;

        // Then
        assert!(result.success);
        assert_eq!(result.method, Some(DeliveryTier::Local));
        assert_eq!(result.sent, 2);
        assert_eq!(presenter.shown.lock().expect("shown lock").len(), 2);

        let log = store.delivery_log().await.expect("log");
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|entry| entry.status == DeliveryStatus::Sent
            && entry.metadata.tier == DeliveryTier::Local));
        let shown = presenter.shown.lock().expect("shown lock");
        let mut shown_ids: Vec<Uuid> = shown.iter().map(|wire| wire.data.notification_id).collect();
        let mut log_ids: Vec<Uuid> = log.iter().map(|entry| entry.id).collect();
        shown_ids.sort();
        log_ids.sort();
        assert_eq!(shown_ids, log_ids);
    }

    #[tokio::test]
    async fn dispatch__should_give_local_payloads_one_shared_tag() {
        // Given
        let store = MemoryStore::new();
        seed_fleet(&store).await;
        let presenter = RecordingPresenter::default();

        // When
        dispatcher(None, &store)
            .dispatch(&custom("X", "hi"), &TargetSelector::All, Some(&presenter))
            .await;

        // Then
        let shown = presenter.shown.lock().expect("shown lock");
        assert_eq!(shown.len(), 3);
        let tag = shown[0].tag.clone().expect("shared tag");
        assert!(tag.starts_with("custom_message-"));
        assert!(shown.iter().all(|wire| wire.tag.as_deref() == Some(tag.as_str())));
    }

    #[tokio::test]
    async fn dispatch__should_skip_unconfigured_web_push() {
        // Given
        let store = MemoryStore::new();
        seed_fleet(&store).await;
        let presenter = RecordingPresenter::default();

        // When
        let result = dispatcher(None, &store)
            .dispatch(&custom("X", "hi"), &TargetSelector::AdminsOnly, Some(&presenter))
            .await;

        // Then
        assert_eq!(result.method, Some(DeliveryTier::Local));
        assert_eq!(result.total, 1);
        assert_eq!(result.sent, 1);
    }

    #[tokio::test]
    async fn dispatch__should_report_failure_when_every_tier_fails() {
        // Given
        let store = MemoryStore::new();
        seed_fleet(&store).await;
        let sender = RecordingSender::default();
        sender.fail_everything(SendError::Transport("offline".to_string()));

        // When
        let result = dispatcher(Some(sender), &store)
            .dispatch(&custom("X", "hi"), &TargetSelector::All, None)
            .await;

        // Then
        assert!(!result.success);
        assert_eq!(result.sent, 0);
        assert_eq!(result.failed, 3);
        assert_eq!(result.method, None);
        let log = store.delivery_log().await.expect("log");
        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|entry| entry.status == DeliveryStatus::Failed));
    }

    #[tokio::test]
    async fn dispatch__should_leave_every_log_entry_terminal() {
        // Given
        let store = MemoryStore::new();
        seed_fleet(&store).await;
        let sender = RecordingSender::default();
        sender.fail("https://push.example/d1", SendError::Gone);
        let dispatcher = dispatcher(Some(sender), &store);

        // When
        dispatcher
            .dispatch(&custom("Same", "one"), &TargetSelector::All, None)
            .await;
        dispatcher
            .dispatch(&custom("Same", "two"), &TargetSelector::All, None)
            .await;

        // Then
        let first_read = store.delivery_log().await.expect("log");
        assert_eq!(first_read.len(), 5);
        assert!(first_read.iter().all(|entry| entry.status.is_terminal()));
        let second_read = store.delivery_log().await.expect("log");
        for (before, after) in first_read.iter().zip(&second_read) {
            assert_eq!(before.status, after.status);
            assert_eq!(before.sent_at, after.sent_at);
        }
    }

    #[test]
    fn endpoint_fingerprint__should_keep_host_only() {
        assert_eq!(
            endpoint_fingerprint("https://fcm.googleapis.com/fcm/send/abc123"),
            "fcm.googleapis.com"
        );
        assert_eq!(endpoint_fingerprint("::"), "invalid-endpoint");
    }
}
