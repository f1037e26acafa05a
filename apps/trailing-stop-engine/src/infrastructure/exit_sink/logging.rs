//! Exit sink that records requests in the log.

use async_trait::async_trait;

use crate::application::ports::{ExitSinkError, ExitSinkPort};
use crate::domain::trailing_stop::ExitRequest;

/// Logs each exit request at `warn` so it stands out in production logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingExitSink;

#[async_trait]
impl ExitSinkPort for LoggingExitSink {
    async fn request_exit(&self, request: ExitRequest) -> Result<(), ExitSinkError> {
        tracing::warn!(
            position_id = %request.position_id,
            reason = %request.reason,
            side = %request.side,
            quantity = %request.quantity,
            trigger_price = %request.trigger_price,
            stop_price = %request.stop_price,
            requested_at = %request.requested_at,
            "Exit requested"
        );
        Ok(())
    }
}
