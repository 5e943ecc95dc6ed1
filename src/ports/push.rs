use std::time::Duration;

use crate::types::push::PushSubscription;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("push endpoint is gone")]
    Gone,
    #[error("push endpoint is not a valid url")]
    InvalidEndpoint,
    #[error("push service rejected the message: {0}")]
    Rejected(String),
    #[error("push transport failed: {0}")]
    Transport(String),
    #[error("push attempt timed out after {0:?}")]
    Timeout(Duration),
}

impl SendError {
    /// Permanent failures deactivate the subscription.
    pub fn is_permanent(&self) -> bool {
        matches!(self, SendError::Gone | SendError::InvalidEndpoint)
    }
}

pub trait PushSender: Clone + Send + Sync + 'static {
    type Fut<'a>: Future<Output = Result<(), SendError>> + Send + 'a
    where
        Self: 'a;

    fn send<'a>(&'a self, subscription: &'a PushSubscription, message: &'a str) -> Self::Fut<'a>;
}
