//! Heartbeat monitoring for feed connections.
//!
//! Tracks app-level ping/pong timing and inbound frame activity. Any inbound
//! frame counts as liveness, so a chatty feed never needs a ping and a quiet
//! feed is probed on the configured interval. A ping left unanswered for
//! twice the interval means the connection is silently dead.

use parking_lot::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

/// Connection health monitor for one stream.
pub struct HeartbeatMonitor {
    /// How often to probe a quiet connection.
    interval: Duration,
    /// Last ping sent, if a pong is still outstanding.
    outstanding_ping: RwLock<Option<Instant>>,
    /// Last inbound activity of any kind.
    last_activity: RwLock<Instant>,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            outstanding_ping: RwLock::new(None),
            last_activity: RwLock::new(Instant::now()),
        }
    }

    /// Reset state on a fresh connection.
    pub fn reset(&self) {
        *self.outstanding_ping.write() = None;
        *self.last_activity.write() = Instant::now();
    }

    /// Record that a ping was sent.
    pub fn record_ping(&self) {
        *self.outstanding_ping.write() = Some(Instant::now());
        debug!("heartbeat ping sent");
    }

    /// Record a pong (or ping response frame).
    pub fn record_pong(&self) {
        *self.outstanding_ping.write() = None;
        *self.last_activity.write() = Instant::now();
    }

    /// Record any inbound frame; liveness clears an outstanding ping.
    pub fn record_activity(&self) {
        *self.last_activity.write() = Instant::now();
        *self.outstanding_ping.write() = None;
    }

    /// An outstanding ping with no liveness response within 2x the
    /// heartbeat interval means the connection is dead.
    pub fn is_timed_out(&self) -> bool {
        match *self.outstanding_ping.read() {
            Some(sent) => sent.elapsed() > self.interval * 2,
            None => false,
        }
    }

    /// Probe only when quiet: no outstanding ping, and nothing received for
    /// a full interval.
    pub fn should_send_ping(&self) -> bool {
        if self.outstanding_ping.read().is_some() {
            return false;
        }
        self.last_activity.read().elapsed() >= self.interval
    }

    /// Wait until the next heartbeat check is due.
    pub async fn wait_for_check(&self) {
        tokio::time::sleep(self.interval / 2).await;
    }
}
