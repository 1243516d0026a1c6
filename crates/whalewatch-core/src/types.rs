//! Shared domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ledger account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque payload received from the wire.
///
/// Frames are transient: they are classified once and discarded, never
/// retained by the pipeline.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Raw text payload as received from the transport.
    pub payload: String,
    /// When the frame was read off the socket.
    pub received_at: DateTime<Utc>,
}

impl RawFrame {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

/// A classified high-value transfer event.
///
/// Invariants are enforced by the classifier before construction:
/// `amount` lies within the configured inclusive threshold range,
/// `source != destination`, and `reference_id` has not been emitted within
/// the recent-history dedup window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferEvent {
    pub source: Account,
    pub destination: Account,
    /// Amount in canonical units (native drops are normalized).
    pub amount: Decimal,
    /// Currency unit the amount is denominated in (e.g. "XRP").
    pub currency: String,
    /// Feed-assigned transaction identifier, used for dedup.
    pub reference_id: String,
    pub observed_at: DateTime<Utc>,
}

/// Per-stream connection lifecycle state.
///
/// Mutated only by the stream's own supervisor; read by health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnecting,
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnecting => write!(f, "disconnecting"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Circuit breaker state as exposed on the health surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Read-only snapshot of a stream's circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
}

/// Read-only health snapshot for one stream, polled by external health
/// checks. Producing it never blocks the supervisor loop.
#[derive(Debug, Clone, Serialize)]
pub struct StreamHealth {
    pub purpose: String,
    pub connection_state: ConnectionState,
    pub breaker: BreakerSnapshot,
    pub reconnect_attempts: u32,
    pub last_event_at: Option<DateTime<Utc>>,
}
