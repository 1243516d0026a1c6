//! Alert sink trait and the built-in log sink.

use thiserror::Error;
use tracing::info;
use whalewatch_core::TransferEvent;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Alert serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Alert delivery failed: {0}")]
    Delivery(String),
}

/// Destination for accepted whale transfer events.
///
/// Implementations must not panic on delivery failure; the dispatcher logs
/// and counts errors and moves on to the next event.
pub trait AlertSink: Send + Sync {
    fn notify(
        &self,
        event: &TransferEvent,
    ) -> impl std::future::Future<Output = Result<(), SinkError>> + Send;
}

/// Sink that emits each alert as a structured log line.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

impl AlertSink for LogSink {
    async fn notify(&self, event: &TransferEvent) -> Result<(), SinkError> {
        info!(
            source = %event.source,
            destination = %event.destination,
            amount = %event.amount,
            currency = %event.currency,
            reference_id = %event.reference_id,
            observed_at = %event.observed_at,
            "whale transfer"
        );
        Ok(())
    }
}
