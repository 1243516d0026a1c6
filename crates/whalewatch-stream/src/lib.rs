//! Resilient stream supervision for ledger feeds.
//!
//! Provides robust WebSocket connectivity with:
//! - Deterministic endpoint rotation across equivalent feed hosts
//! - Exponential backoff with jitter (thundering herd prevention)
//! - Per-stream circuit breaker (closed/open/half-open)
//! - Heartbeat monitoring with app-level ping and liveness tracking
//! - Cancellable timers and graceful per-stream shutdown

pub mod backoff;
pub mod breaker;
pub mod endpoints;
pub mod error;
pub mod heartbeat;
pub mod message;
pub mod registry;
pub mod supervisor;

pub use backoff::BackoffPolicy;
pub use breaker::CircuitBreaker;
pub use endpoints::EndpointPool;
pub use error::{StreamError, StreamResult};
pub use heartbeat::HeartbeatMonitor;
pub use message::{FeedRequest, FrameEnvelope};
pub use registry::StreamRegistry;
pub use supervisor::{StreamConfig, StreamSupervisor};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
