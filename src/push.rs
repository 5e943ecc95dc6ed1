use crate::ports::push::PushSender;
use crate::ports::store::DataStore;
use crate::ports::time::TimeProvider;
use crate::types::push::{DispatchResult, NotificationEvent, TargetSelector};

pub mod composer;
pub mod delivery_log;
pub mod dispatch;
pub mod presenter;
pub mod registrar;
pub mod vapid;

pub use composer::{ComposeError, Composer};
pub use delivery_log::DeliveryStats;
pub use dispatch::Dispatcher;
pub use presenter::{Present, Presenter};
pub use registrar::{RecipientClassifier, Registrar, RegistrationError};
pub use vapid::{VapidConfigStatus, VapidCredentials, load_vapid_config};

/// Compose, then dispatch. Composition errors stop the call before any
/// subscription is resolved or logged.
#[derive(Debug, Clone)]
pub struct PushService<S, D, T> {
    composer: Composer,
    dispatcher: Dispatcher<S, D, T>,
}

impl<S, D, T> PushService<S, D, T>
where
    S: PushSender,
    D: DataStore,
    T: TimeProvider,
{
    pub fn new(composer: Composer, dispatcher: Dispatcher<S, D, T>) -> Self {
        Self {
            composer,
            dispatcher,
        }
    }

    pub async fn notify(
        &self,
        event: &NotificationEvent,
        target: &TargetSelector,
        initiator: Option<&dyn Present>,
    ) -> Result<DispatchResult, ComposeError> {
        let payload = self.composer.compose(event)?;
        Ok(self.dispatcher.dispatch(&payload, target, initiator).await)
    }

    pub async fn send_custom_message(
        &self,
        title: Option<String>,
        message: String,
        target: &TargetSelector,
        initiator: Option<&dyn Present>,
    ) -> Result<DispatchResult, ComposeError> {
        let event = NotificationEvent::CustomMessage {
            title,
            body: message,
        };
        self.notify(&event, target, initiator).await
    }
}
