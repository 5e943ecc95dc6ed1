use std::sync::Arc;

use crate::adapters::{TokioTimeProvider, WebPushSender};
use crate::config::AppConfig;
use crate::push::{self, Composer, Dispatcher, PushService, RecipientClassifier};
use crate::rides::{ExtraRideDesk, RideEvent};
use crate::store::MemoryStore;
use crate::types::push::VapidConfig;

pub type AppPushService = PushService<WebPushSender, MemoryStore, TokioTimeProvider>;
pub type AppRideDesk = ExtraRideDesk<MemoryStore, TokioTimeProvider>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub vapid: Option<VapidConfig>,
    pub store: MemoryStore,
    pub time: TokioTimeProvider,
    pub classifier: Arc<RecipientClassifier>,
    pub push: Arc<AppPushService>,
    pub rides: AppRideDesk,
}

impl AppState {
    pub fn new(config: AppConfig, store: MemoryStore) -> Self {
        let vapid = match push::load_vapid_config(&config.vapid) {
            push::VapidConfigStatus::Ready(vapid) => Some(vapid),
            push::VapidConfigStatus::Incomplete => {
                tracing::warn!("web push disabled: incomplete VAPID configuration");
                None
            }
            push::VapidConfigStatus::Mismatched => {
                tracing::warn!("web push disabled: VAPID public key does not match private key");
                None
            }
            push::VapidConfigStatus::Missing => {
                tracing::info!("web push disabled: no VAPID configuration");
                None
            }
        };
        let sender = vapid.clone().and_then(|vapid| {
            WebPushSender::new(vapid, config.ttl_secs)
                .inspect_err(|err| tracing::error!(%err, "web push disabled: failed to init client"))
                .ok()
        });

        let time = TokioTimeProvider;
        let dispatcher = Dispatcher::new(sender, store.clone(), time)
            .with_send_timeout(config.send_timeout);
        let push = Arc::new(PushService::new(Composer::from_config(&config), dispatcher));
        let rides = ExtraRideDesk::new(store.clone(), time);
        let classifier = Arc::new(RecipientClassifier::new(config.admin_recipients.clone()));

        // Kept for the life of the desk.
        let _ride_notifications = rides.subscribe(ride_notifier(Arc::clone(&push)));

        Self {
            config: Arc::new(config),
            vapid,
            store,
            time,
            classifier,
            push,
            rides,
        }
    }
}

/// Server-side reaction to ride changes. There is no initiating device, so
/// the local tier never runs for these.
fn ride_notifier(push: Arc<AppPushService>) -> impl Fn(&RideEvent) + Send + Sync + 'static {
    move |event: &RideEvent| {
        let Some((notification, target)) = event.notification() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("no runtime to dispatch ride notification on");
            return;
        };
        let push = Arc::clone(&push);
        runtime.spawn(async move {
            match push.notify(&notification, &target, None).await {
                Ok(result) => tracing::info!(
                    kind = notification.kind().as_str(),
                    sent = result.sent,
                    total = result.total,
                    "ride notification dispatched"
                ),
                Err(err) => tracing::error!(%err, "ride notification not composed"),
            }
        });
    }
}
