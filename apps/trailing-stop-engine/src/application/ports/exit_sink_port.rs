//! Exit Sink Port (Driven Port)
//!
//! Interface for handing exit requests to the execution subsystem.

use async_trait::async_trait;

use crate::domain::trailing_stop::ExitRequest;

/// Exit delivery error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExitSinkError {
    /// Receiver is gone.
    #[error("Exit sink closed")]
    Closed,

    /// Delivery failed.
    #[error("Exit delivery failed: {message}")]
    DeliveryFailed {
        /// Error details.
        message: String,
    },
}

/// Port receiving exit requests.
///
/// Called after the triggered state has been durably written. A request the
/// sink fails to accept within the exit timeout is retried on a later cycle,
/// so delivery is at least once; `position_id` identifies repeats.
#[async_trait]
pub trait ExitSinkPort: Send + Sync {
    /// Deliver one exit request.
    ///
    /// # Errors
    ///
    /// Returns error if the request could not be handed off.
    async fn request_exit(&self, request: ExitRequest) -> Result<(), ExitSinkError>;
}

/// Exit sink that drops every request.
#[derive(Debug, Clone, Default)]
pub struct NoOpExitSink;

#[async_trait]
impl ExitSinkPort for NoOpExitSink {
    async fn request_exit(&self, _request: ExitRequest) -> Result<(), ExitSinkError> {
        Ok(())
    }
}
