//! Main application orchestration.
//!
//! Wires the components together:
//! - One supervised WebSocket stream per configured purpose
//! - One pipeline task per stream (frames in, classified events out)
//! - A single alert dispatcher draining the shared event channel
//! - A periodic telemetry sync publishing health and counters
//! - Graceful shutdown on SIGINT

use crate::config::AppConfig;
use crate::error::AppResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use whalewatch_alert::{AlertDispatcher, DispatcherStats, LogSink};
use whalewatch_core::{RawFrame, TransferEvent};
use whalewatch_feed::{ClassifierSnapshot, ClassifierStats, TransferClassifier};
use whalewatch_stream::{StreamRegistry, StreamSupervisor};
use whalewatch_telemetry::Metrics;

/// Telemetry sync cadence.
const TELEMETRY_SYNC_INTERVAL: Duration = Duration::from_secs(10);

struct PipelineHandle {
    purpose: String,
    stats: Arc<ClassifierStats>,
    last: ClassifierSnapshot,
    task: JoinHandle<()>,
}

/// Main application.
pub struct Application {
    config: AppConfig,
    registry: Arc<StreamRegistry>,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry: Arc::new(StreamRegistry::new()),
        })
    }

    /// All current stream health snapshots.
    pub fn health(&self) -> Vec<whalewatch_core::StreamHealth> {
        self.registry.health()
    }

    /// Run until SIGINT, then shut down gracefully.
    pub async fn run(self) -> AppResult<()> {
        info!(
            streams = self.config.streams.len(),
            "Starting whale transfer monitor"
        );

        let (event_tx, event_rx) = mpsc::channel::<TransferEvent>(self.config.alert.event_buffer);

        let dispatcher = AlertDispatcher::new(LogSink::new(), event_rx);
        let dispatcher_stats = dispatcher.stats();
        let dispatcher_task = tokio::spawn(dispatcher.run());

        let mut pipelines = Vec::with_capacity(self.config.streams.len());
        for settings in &self.config.streams {
            let (frame_tx, frame_rx) = mpsc::channel::<RawFrame>(settings.frame_buffer);

            let supervisor = Arc::new(StreamSupervisor::new(settings.stream_config(), frame_tx)?);
            self.registry.spawn(supervisor);

            let classifier = TransferClassifier::new(settings.classifier_config())?;
            let stats = classifier.stats();
            let purpose = settings.purpose.clone();
            let task = tokio::spawn(pipeline(purpose.clone(), frame_rx, classifier, event_tx.clone()));

            pipelines.push(PipelineHandle {
                purpose,
                stats,
                last: ClassifierSnapshot::default(),
                task,
            });
        }
        // the dispatcher exits once every pipeline's sender is gone
        drop(event_tx);

        info!("Entering main loop, press Ctrl+C to stop");

        let mut last_alerts = (0u64, 0u64);
        let mut sync_interval = tokio::time::interval(TELEMETRY_SYNC_INTERVAL);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                res = &mut ctrl_c => {
                    if let Err(e) = res {
                        warn!(?e, "SIGINT handler failed, shutting down");
                    } else {
                        info!("SIGINT received, shutting down");
                    }
                    break;
                }
                _ = sync_interval.tick() => {
                    self.sync_telemetry(&mut pipelines, &dispatcher_stats, &mut last_alerts);
                }
            }
        }

        self.shutdown(pipelines, dispatcher_task).await;
        Ok(())
    }

    /// Stop streams, drain pipelines, wait for the dispatcher.
    async fn shutdown(self, pipelines: Vec<PipelineHandle>, dispatcher_task: JoinHandle<()>) {
        let grace = Duration::from_millis(self.config.shutdown.grace_ms);
        self.registry.stop_all(grace).await;

        // supervisors are gone, so the frame senders are dropped and each
        // pipeline drains to completion
        for handle in pipelines {
            if let Err(e) = handle.task.await {
                warn!(purpose = %handle.purpose, ?e, "pipeline task panicked");
            }
        }
        if let Err(e) = dispatcher_task.await {
            warn!(?e, "dispatcher task panicked");
        }
        info!("Shutdown complete");
    }

    /// Publish health gauges and counter deltas to Prometheus.
    fn sync_telemetry(
        &self,
        pipelines: &mut [PipelineHandle],
        dispatcher_stats: &DispatcherStats,
        last_alerts: &mut (u64, u64),
    ) {
        for health in self.registry.health() {
            Metrics::connection_state(&health.purpose, health.connection_state);
            Metrics::breaker_state(&health.purpose, health.breaker.state);
            Metrics::reconnect_attempts(&health.purpose, health.reconnect_attempts);
        }

        for handle in pipelines {
            let now = handle.stats.snapshot();
            let prev = handle.last;
            let purpose = handle.purpose.as_str();

            Metrics::parse_errors(purpose, now.parse_errors - prev.parse_errors);
            Metrics::events_accepted(purpose, now.accepted - prev.accepted);
            for (reason, current, previous) in [
                ("type", now.rejected_type, prev.rejected_type),
                (
                    "missing_fields",
                    now.rejected_missing_fields,
                    prev.rejected_missing_fields,
                ),
                (
                    "self_transfer",
                    now.rejected_self_transfer,
                    prev.rejected_self_transfer,
                ),
                (
                    "out_of_range",
                    now.rejected_out_of_range,
                    prev.rejected_out_of_range,
                ),
                ("suspicious", now.rejected_suspicious, prev.rejected_suspicious),
                ("duplicate", now.rejected_duplicate, prev.rejected_duplicate),
            ] {
                Metrics::events_rejected(purpose, reason, current - previous);
            }
            handle.last = now;
        }

        let delivered = dispatcher_stats.delivered();
        let failed = dispatcher_stats.failed();
        Metrics::alerts_delivered(delivered - last_alerts.0);
        Metrics::alerts_failed(failed - last_alerts.1);
        *last_alerts = (delivered, failed);
    }
}

/// Per-stream pipeline: classify frames in arrival order and forward
/// accepted events to the dispatcher.
async fn pipeline(
    purpose: String,
    mut frame_rx: mpsc::Receiver<RawFrame>,
    mut classifier: TransferClassifier,
    event_tx: mpsc::Sender<TransferEvent>,
) {
    while let Some(frame) = frame_rx.recv().await {
        Metrics::frame_received(&purpose);
        if let Some(event) = classifier.classify(&frame) {
            info!(
                purpose = %purpose,
                amount = %event.amount,
                currency = %event.currency,
                reference_id = %event.reference_id,
                "whale transfer classified"
            );
            if event_tx.send(event).await.is_err() {
                warn!(purpose = %purpose, "event channel closed, stopping pipeline");
                break;
            }
        }
    }
    debug!(purpose = %purpose, "pipeline stopped");
}
