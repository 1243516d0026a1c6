//! Event dispatch loop.

use crate::sink::AlertSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use whalewatch_core::TransferEvent;

/// Delivery counters, shared read-only with telemetry.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
}

impl DispatcherStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Drains classified events from the pipeline and delivers each one
/// through the sink exactly once per attempt.
///
/// Delivery is at-most-once: a failed notification is logged and counted,
/// never retried. The loop exits when every sender has been dropped, which
/// is how shutdown propagates from the pipelines.
pub struct AlertDispatcher<S: AlertSink> {
    sink: S,
    event_rx: mpsc::Receiver<TransferEvent>,
    stats: Arc<DispatcherStats>,
}

impl<S: AlertSink> AlertDispatcher<S> {
    pub fn new(sink: S, event_rx: mpsc::Receiver<TransferEvent>) -> Self {
        Self {
            sink,
            event_rx,
            stats: Arc::new(DispatcherStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<DispatcherStats> {
        self.stats.clone()
    }

    pub async fn run(mut self) {
        info!("Alert dispatcher started");

        while let Some(event) = self.event_rx.recv().await {
            match self.sink.notify(&event).await {
                Ok(()) => {
                    self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                    debug!(reference_id = %event.reference_id, "alert delivered");
                }
                Err(e) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        reference_id = %event.reference_id,
                        error = %e,
                        "alert delivery failed, event dropped"
                    );
                }
            }
        }

        info!(
            delivered = self.stats.delivered(),
            failed = self.stats.failed(),
            "Alert dispatcher stopped"
        );
    }
}
