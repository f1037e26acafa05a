//! Exit sink forwarding requests over a tokio mpsc channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::ports::{ExitSinkError, ExitSinkPort};
use crate::domain::trailing_stop::ExitRequest;

/// Exit sink that hands requests to an in-process consumer.
#[derive(Debug, Clone)]
pub struct ChannelExitSink {
    tx: mpsc::Sender<ExitRequest>,
}

impl ChannelExitSink {
    /// Create a sink and the receiver that consumes its requests.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ExitRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ExitSinkPort for ChannelExitSink {
    async fn request_exit(&self, request: ExitRequest) -> Result<(), ExitSinkError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| ExitSinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::{PositionId, Timestamp};
    use crate::domain::trailing_stop::{ExitReason, PositionSide};
    use rust_decimal_macros::dec;

    fn request() -> ExitRequest {
        ExitRequest {
            position_id: PositionId::new("pos-1"),
            reason: ExitReason::TrailingStop,
            side: PositionSide::Long,
            quantity: dec!(100),
            trigger_price: dec!(0.88),
            stop_price: dec!(0.882),
            requested_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn forwards_requests() {
        let (sink, mut rx) = ChannelExitSink::new(4);
        sink.request_exit(request()).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.position_id.as_str(), "pos-1");
    }

    #[tokio::test]
    async fn closed_receiver_is_an_error() {
        let (sink, rx) = ChannelExitSink::new(1);
        drop(rx);
        assert_eq!(
            sink.request_exit(request()).await,
            Err(ExitSinkError::Closed)
        );
    }
}
