//! Error types shared by the publishing core.

use thiserror::Error;

use crate::event::EventError;

/// Failures that abort a publish before or instead of broadcasting.
///
/// Per-relay failures are not represented here: they are recorded on the
/// [`BroadcastReport`](crate::broadcast::BroadcastReport) and never abort the
/// overall operation.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("invalid secret key: {0}")]
    KeyDecode(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("no relays configured")]
    NoRelays,
}

impl From<EventError> for PublishError {
    fn from(e: EventError) -> Self {
        PublishError::Signing(e.to_string())
    }
}
