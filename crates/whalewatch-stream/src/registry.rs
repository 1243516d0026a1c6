//! Stream registry.
//!
//! Explicit owner of every running supervisor, constructed once at startup
//! and handed to whatever needs to query or stop streams. There are no
//! process-wide singletons: dropping the registry (after `stop_all`) drops
//! the streams.

use crate::supervisor::StreamSupervisor;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use whalewatch_core::StreamHealth;

struct StreamHandle {
    supervisor: Arc<StreamSupervisor>,
    task: JoinHandle<()>,
}

/// Owner of all registered stream supervisors.
#[derive(Default)]
pub struct StreamRegistry {
    streams: Mutex<HashMap<String, StreamHandle>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a supervisor's run loop and take ownership of it.
    ///
    /// Registering a purpose twice stops the previous stream first.
    pub fn spawn(&self, supervisor: Arc<StreamSupervisor>) {
        let purpose = supervisor.purpose().to_string();
        let task = {
            let sup = supervisor.clone();
            tokio::spawn(async move { sup.run().await })
        };

        let previous = self.streams.lock().insert(
            purpose.clone(),
            StreamHandle { supervisor, task },
        );
        if let Some(old) = previous {
            warn!(purpose = %purpose, "replacing existing stream, stopping old supervisor");
            old.supervisor.stop();
            old.task.abort();
        }
        info!(purpose = %purpose, "stream registered");
    }

    /// Number of registered streams.
    pub fn len(&self) -> usize {
        self.streams.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.lock().is_empty()
    }

    /// Health snapshots for every registered stream.
    pub fn health(&self) -> Vec<StreamHealth> {
        self.streams
            .lock()
            .values()
            .map(|h| h.supervisor.health())
            .collect()
    }

    /// Health snapshot for one stream.
    pub fn health_of(&self, purpose: &str) -> Option<StreamHealth> {
        self.streams
            .lock()
            .get(purpose)
            .map(|h| h.supervisor.health())
    }

    /// Stop one stream by purpose. Returns false if it was not registered.
    /// The task keeps its registry slot until `stop_all` reaps it.
    pub fn stop(&self, purpose: &str) -> bool {
        match self.streams.lock().get(purpose) {
            Some(handle) => {
                handle.supervisor.stop();
                true
            }
            None => false,
        }
    }

    /// Stop every stream and wait up to `grace` for the tasks to finish.
    ///
    /// Supervisors that do not stop within the grace period are aborted so
    /// process shutdown is never blocked on a wedged stream.
    pub async fn stop_all(&self, grace: Duration) {
        let handles: Vec<(String, StreamHandle)> =
            self.streams.lock().drain().collect();

        for (_, handle) in &handles {
            handle.supervisor.stop();
        }

        let deadline = tokio::time::Instant::now() + grace;
        for (purpose, handle) in handles {
            let abort = handle.task.abort_handle();
            match tokio::time::timeout_at(deadline, handle.task).await {
                Ok(Ok(())) => info!(purpose = %purpose, "stream stopped"),
                Ok(Err(e)) => warn!(purpose = %purpose, ?e, "stream task panicked"),
                Err(_) => {
                    warn!(purpose = %purpose, "stream did not stop within grace period, aborting");
                    abort.abort();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::StreamConfig;
    use tokio::sync::mpsc;

    fn supervisor(purpose: &str) -> Arc<StreamSupervisor> {
        let (tx, _rx) = mpsc::channel(8);
        let cfg = StreamConfig {
            purpose: purpose.to_string(),
            // unroutable: supervisors will churn through backoff harmlessly
            endpoints: vec!["ws://127.0.0.1:9".to_string()],
            backoff_base_ms: 50,
            connect_timeout_ms: 200,
            ..Default::default()
        };
        Arc::new(StreamSupervisor::new(cfg, tx).unwrap())
    }

    #[tokio::test]
    async fn test_spawn_and_health() {
        let registry = StreamRegistry::new();
        registry.spawn(supervisor("whale-monitor"));
        registry.spawn(supervisor("price-feed"));
        assert_eq!(registry.len(), 2);

        let health = registry.health();
        assert_eq!(health.len(), 2);
        assert!(registry.health_of("whale-monitor").is_some());
        assert!(registry.health_of("nope").is_none());

        registry.stop_all(Duration::from_secs(1)).await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_stop_unknown_purpose() {
        let registry = StreamRegistry::new();
        assert!(!registry.stop("ghost"));
    }

    #[tokio::test]
    async fn test_stop_all_within_grace() {
        let registry = StreamRegistry::new();
        registry.spawn(supervisor("whale-monitor"));

        // even mid-backoff the supervisor must exit promptly
        tokio::time::sleep(Duration::from_millis(50)).await;
        let start = tokio::time::Instant::now();
        registry.stop_all(Duration::from_secs(5)).await;
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
