use std::time::Duration;

use thiserror::Error;

/// Why a single channel send did not deliver.
///
/// Adapters return these as values; the dispatcher turns them into failed
/// `DeliveryAttempt`s and never lets them abort sibling sends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// No adapter is configured for this channel in this deployment.
    #[error("channel unavailable: no adapter configured")]
    Unavailable,

    /// The provider answered but refused the message.
    #[error("provider rejected message: {0}")]
    Rejected(String),

    /// The provider could not be reached.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The send did not settle within the per-channel bound.
    #[error("send timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl ChannelError {
    /// Provider-side failures, as opposed to a missing adapter.
    pub fn is_send_failure(&self) -> bool {
        !matches!(self, ChannelError::Unavailable)
    }
}

/// Errors that escape the dispatcher and the broadcast scheduler.
///
/// Per-channel and per-recipient problems are degraded into outcome values.
/// Only `Recorder` propagates out of a dispatch or broadcast; `Directory` is
/// reported by `RecipientDirectory` and turned into `DirectoryUnavailable`.
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Delivery recorder error: {0}")]
    Recorder(String),

    #[error("Recipient directory error: {0}")]
    Directory(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_uses_millis() {
        let err = ChannelError::Timeout(Duration::from_millis(2500));
        assert_eq!(err.to_string(), "send timed out after 2500ms");
    }

    #[test]
    fn test_unavailable_is_not_a_send_failure() {
        assert!(!ChannelError::Unavailable.is_send_failure());
        assert!(ChannelError::Rejected("400".into()).is_send_failure());
    }
}
