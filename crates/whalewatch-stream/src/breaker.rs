//! Per-stream circuit breaker.
//!
//! The breaker never errors, it only advises: `allow()` tells the supervisor
//! whether a new connection attempt may be made, and the supervisor decides
//! what counts as a failure (timeout, abnormal close, heartbeat loss).

use std::time::{Duration, Instant};
use tracing::{debug, warn};
use whalewatch_core::{BreakerSnapshot, BreakerState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open { opened_at: Instant },
    HalfOpen,
}

/// Closed / Open / HalfOpen failure gate for one logical stream.
///
/// Created at stream registration and owned by that stream's supervisor for
/// the process lifetime; never shared between streams.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_after: Duration,
    consecutive_failures: u32,
    state: State,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_after: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_after,
            consecutive_failures: 0,
            state: State::Closed,
        }
    }

    /// Whether a new connection attempt is allowed right now.
    ///
    /// While Open, returns false until the cool-down elapses; the first call
    /// after that transitions to HalfOpen and lets exactly one probe through.
    /// Further calls return false until the probe resolves via
    /// `record_success` or `record_failure`.
    pub fn allow(&mut self) -> bool {
        match self.state {
            State::Closed => true,
            State::Open { opened_at } => {
                if opened_at.elapsed() >= self.reset_after {
                    debug!("circuit half-open, allowing one probe");
                    self.state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
            State::HalfOpen => false,
        }
    }

    /// Record a successful, subscribed connection.
    pub fn record_success(&mut self) {
        if self.state != State::Closed {
            debug!("circuit closed");
        }
        self.state = State::Closed;
        self.consecutive_failures = 0;
    }

    /// Record a connection failure as judged by the supervisor.
    pub fn record_failure(&mut self) {
        match self.state {
            State::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.failure_threshold {
                    warn!(
                        failures = self.consecutive_failures,
                        cooldown_ms = self.reset_after.as_millis(),
                        "circuit opened"
                    );
                    self.state = State::Open {
                        opened_at: Instant::now(),
                    };
                }
            }
            // a failed half-open probe, or a late failure report, re-arms
            // the cool-down from now
            State::HalfOpen | State::Open { .. } => {
                self.consecutive_failures += 1;
                self.state = State::Open {
                    opened_at: Instant::now(),
                };
            }
        }
    }

    /// Read-only snapshot for the health surface.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = match self.state {
            State::Closed => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen => BreakerState::HalfOpen,
        };
        BreakerSnapshot {
            state,
            consecutive_failures: self.consecutive_failures,
        }
    }
}
