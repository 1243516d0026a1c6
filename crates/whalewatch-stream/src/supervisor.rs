//! Stream supervisor.
//!
//! Owns the full lifecycle of one named stream: connect, subscribe,
//! heartbeat, staleness detection, disconnect, and rescheduling through the
//! circuit breaker, backoff policy and endpoint pool. Transient transport
//! errors are always retried; only an explicit `stop()` is terminal.

use crate::backoff::BackoffPolicy;
use crate::breaker::CircuitBreaker;
use crate::endpoints::EndpointPool;
use crate::error::{StreamError, StreamResult};
use crate::heartbeat::HeartbeatMonitor;
use crate::message::{FeedRequest, FrameEnvelope};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use whalewatch_core::{ConnectionState, CoreError, RawFrame, StreamHealth};

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsStream = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

/// Configuration for one named stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Stream name, e.g. "whale-monitor".
    pub purpose: String,
    /// Equivalent feed endpoints, tried in round-robin order.
    pub endpoints: Vec<String>,
    /// Feed streams named in the subscribe handshake.
    pub subscribe_streams: Vec<String>,
    /// Bound on opening the transport.
    pub connect_timeout_ms: u64,
    /// Bound on the subscribe handshake ack.
    pub subscribe_timeout_ms: u64,
    /// Heartbeat probe interval; liveness timeout is twice this.
    pub heartbeat_interval_ms: u64,
    /// Base delay for reconnect backoff.
    pub backoff_base_ms: u64,
    /// Ceiling for reconnect backoff.
    pub backoff_max_ms: u64,
    /// Uniform jitter span as a fraction of the pre-jitter delay.
    pub jitter_factor: f64,
    /// Consecutive failures before the circuit opens.
    pub circuit_failure_threshold: u32,
    /// Cool-down before the open circuit admits a half-open probe.
    pub circuit_reset_after_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            purpose: String::new(),
            endpoints: Vec::new(),
            subscribe_streams: vec!["transactions".to_string()],
            connect_timeout_ms: 20_000,
            subscribe_timeout_ms: 10_000,
            heartbeat_interval_ms: 30_000,
            backoff_base_ms: 1_000,
            backoff_max_ms: 300_000,
            jitter_factor: 0.5,
            circuit_failure_threshold: 5,
            circuit_reset_after_ms: 60_000,
        }
    }
}

impl StreamConfig {
    fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    fn subscribe_timeout(&self) -> Duration {
        Duration::from_millis(self.subscribe_timeout_ms)
    }
}

/// Outcome of the subscribe handshake.
enum Handshake {
    Acked,
    Cancelled,
}

/// Supervisor for one logical feed stream.
///
/// Runs as a single task (`run()`); all other methods are safe to call from
/// other tasks and never block the loop.
pub struct StreamSupervisor {
    config: StreamConfig,
    state: RwLock<ConnectionState>,
    pool: RwLock<EndpointPool>,
    breaker: RwLock<CircuitBreaker>,
    backoff: BackoffPolicy,
    heartbeat: HeartbeatMonitor,
    reconnect_attempts: RwLock<u32>,
    last_event_at: RwLock<Option<DateTime<Utc>>>,
    frame_tx: mpsc::Sender<RawFrame>,
    shutdown: CancellationToken,
    running: AtomicBool,
}

impl StreamSupervisor {
    /// Build a supervisor; configuration errors are fatal here, before any
    /// I/O happens.
    pub fn new(config: StreamConfig, frame_tx: mpsc::Sender<RawFrame>) -> Result<Self, CoreError> {
        if config.purpose.is_empty() {
            return Err(CoreError::InvalidConfig(
                "stream purpose must not be empty".to_string(),
            ));
        }
        if config.heartbeat_interval_ms == 0 || config.connect_timeout_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "timeouts and intervals must be positive".to_string(),
            ));
        }
        let pool = EndpointPool::new(config.endpoints.clone())?;
        let backoff = BackoffPolicy::new(
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_max_ms),
            config.jitter_factor,
        );
        let breaker = CircuitBreaker::new(
            config.circuit_failure_threshold,
            Duration::from_millis(config.circuit_reset_after_ms),
        );
        let heartbeat = HeartbeatMonitor::new(Duration::from_millis(config.heartbeat_interval_ms));

        Ok(Self {
            config,
            state: RwLock::new(ConnectionState::Idle),
            pool: RwLock::new(pool),
            breaker: RwLock::new(breaker),
            backoff,
            heartbeat,
            reconnect_attempts: RwLock::new(0),
            last_event_at: RwLock::new(None),
            frame_tx,
            shutdown: CancellationToken::new(),
            running: AtomicBool::new(false),
        })
    }

    /// Stream name.
    pub fn purpose(&self) -> &str {
        &self.config.purpose
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Reconnect attempts since the last subscribed connection.
    pub fn reconnect_attempts(&self) -> u32 {
        *self.reconnect_attempts.read()
    }

    /// Read-only health snapshot.
    pub fn health(&self) -> StreamHealth {
        StreamHealth {
            purpose: self.config.purpose.clone(),
            connection_state: *self.state.read(),
            breaker: self.breaker.read().snapshot(),
            reconnect_attempts: *self.reconnect_attempts.read(),
            last_event_at: *self.last_event_at.read(),
        }
    }

    /// Request shutdown. Idempotent and safe from any state: cancels a
    /// pending backoff timer, an in-flight connect, or the message loop.
    pub fn stop(&self) {
        info!(purpose = %self.config.purpose, "stream stop requested");
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Run the supervision loop until `stop()` is called.
    ///
    /// Idempotent: a second call while the loop is live returns immediately.
    pub async fn run(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!(purpose = %self.config.purpose, "supervisor already running");
            return;
        }

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let attempts = *self.reconnect_attempts.read();
            if !self.breaker.write().allow() {
                let delay = self.backoff.delay(attempts);
                debug!(
                    purpose = %self.config.purpose,
                    delay_ms = delay.as_millis(),
                    "circuit open, deferring connection attempt"
                );
                if !self.sleep_or_shutdown(delay).await {
                    break;
                }
                continue;
            }

            *self.state.write() = ConnectionState::Connecting;
            let url = self.pool.read().current().to_string();

            let result = self.try_connect(&url).await;

            if self.shutdown.is_cancelled() {
                if let Err(e) = result {
                    debug!(purpose = %self.config.purpose, ?e, "error during shutdown, ignored");
                }
                break;
            }

            let reason = match result {
                Ok(()) => "connection_closed",
                Err(ref e) => {
                    warn!(purpose = %self.config.purpose, url = %url, error = %e, "stream failure");
                    e.reason()
                }
            };

            let attempts = self.on_failure(reason);
            let delay = self.backoff.delay(attempts);
            warn!(
                purpose = %self.config.purpose,
                attempt = attempts,
                delay_ms = delay.as_millis(),
                "reconnecting"
            );
            if !self.sleep_or_shutdown(delay).await {
                break;
            }
        }

        *self.state.write() = ConnectionState::Idle;
        self.running.store(false, Ordering::SeqCst);
        info!(purpose = %self.config.purpose, "supervisor stopped");
    }

    /// Record a failure: advise the breaker, bump the attempt counter,
    /// rotate the endpoint pool. Returns the new attempt count.
    fn on_failure(&self, reason: &str) -> u32 {
        self.breaker.write().record_failure();
        let attempts = {
            let mut a = self.reconnect_attempts.write();
            *a += 1;
            *a
        };
        self.pool.write().rotate();
        *self.state.write() = ConnectionState::Failed;
        debug!(purpose = %self.config.purpose, reason, attempts, "failure recorded");
        attempts
    }

    /// Sleep for `delay`, returning false if shutdown interrupted it.
    async fn sleep_or_shutdown(&self, delay: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(delay) => true,
            () = self.shutdown.cancelled() => false,
        }
    }

    /// One connection attempt: open, subscribe, then pump the message loop.
    ///
    /// Returns Ok only when shutdown ends the connection cleanly; every
    /// other exit is an error the caller turns into a reconnect.
    async fn try_connect(&self, url: &str) -> StreamResult<()> {
        info!(purpose = %self.config.purpose, url = %url, "connecting");

        let connect = connect_async_tls_with_config(url, None, true, None);
        let (ws_stream, _response) = tokio::select! {
            res = tokio::time::timeout(self.config.connect_timeout(), connect) => match res {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(StreamError::ConnectTimeout),
            },
            () = self.shutdown.cancelled() => return Ok(()),
        };
        let (mut write, mut read) = ws_stream.split();

        // Subscribe handshake with its own timeout
        let request = FeedRequest::subscribe(&self.config.subscribe_streams);
        write
            .send(Message::Text(serde_json::to_string(&request)?))
            .await?;
        // success is only recorded for a real ack, not a cancelled handshake
        match self.await_subscribe_ack(&mut write, &mut read).await? {
            Handshake::Acked => {}
            Handshake::Cancelled => return Ok(()),
        }

        *self.state.write() = ConnectionState::Connected;
        self.breaker.write().record_success();
        *self.reconnect_attempts.write() = 0;
        self.heartbeat.reset();
        info!(purpose = %self.config.purpose, url = %url, "stream subscribed");

        self.message_loop(&mut write, &mut read).await
    }

    /// Wait for the subscribe command response, forwarding any data frames
    /// that arrive first.
    async fn await_subscribe_ack(
        &self,
        write: &mut WsSink,
        read: &mut WsStream,
    ) -> StreamResult<Handshake> {
        let deadline = tokio::time::Instant::now() + self.config.subscribe_timeout();

        loop {
            let msg = tokio::select! {
                res = tokio::time::timeout_at(deadline, read.next()) => match res {
                    Ok(msg) => msg,
                    Err(_) => return Err(StreamError::SubscribeTimeout),
                },
                () = self.shutdown.cancelled() => return Ok(Handshake::Cancelled),
            };

            match msg {
                Some(Ok(Message::Text(text))) => {
                    self.heartbeat.record_activity();
                    if let Some(env) = FrameEnvelope::parse(&text) {
                        if env.is_response() {
                            if env.is_success() {
                                return Ok(Handshake::Acked);
                            }
                            return Err(StreamError::SubscribeRejected(text.to_string()));
                        }
                    }
                    // data frame ahead of the ack, forward as usual
                    self.forward_frame(text.to_string()).await;
                }
                Some(Ok(Message::Ping(data))) => write.send(Message::Pong(data)).await?,
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = close_details(frame);
                    return Err(StreamError::ConnectionClosed { code, reason });
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(StreamError::ConnectionClosed {
                        code: 1006,
                        reason: "stream ended during subscribe".to_string(),
                    })
                }
                _ => {}
            }
        }
    }

    async fn message_loop(&self, write: &mut WsSink, read: &mut WsStream) -> StreamResult<()> {
        loop {
            tokio::select! {
                // shutdown wins over pending I/O
                () = self.shutdown.cancelled() => {
                    *self.state.write() = ConnectionState::Disconnecting;
                    // clean close so the server-side handler does not see an
                    // abnormal disconnect
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(purpose = %self.config.purpose, ?e, "close frame failed");
                    }
                    return Ok(());
                }

                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle_frame(text.to_string()).await,
                    Some(Ok(Message::Ping(data))) => {
                        self.heartbeat.record_activity();
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Pong(_))) => self.heartbeat.record_pong(),
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = close_details(frame);
                        warn!(purpose = %self.config.purpose, code, %reason, "closed by server");
                        return Err(StreamError::ConnectionClosed { code, reason });
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(StreamError::ConnectionClosed {
                        code: 1006,
                        reason: "stream ended".to_string(),
                    }),
                    _ => {}
                },

                _ = self.heartbeat.wait_for_check() => {
                    if self.heartbeat.is_timed_out() {
                        return Err(StreamError::HeartbeatTimeout);
                    }
                    if self.heartbeat.should_send_ping() {
                        let ping = FeedRequest::ping();
                        write.send(Message::Text(serde_json::to_string(&ping)?)).await?;
                        self.heartbeat.record_ping();
                    }
                }
            }
        }
    }

    /// Route one inbound text frame: command responses feed the heartbeat,
    /// everything else goes downstream in arrival order.
    async fn handle_frame(&self, text: String) {
        self.heartbeat.record_activity();

        if let Some(env) = FrameEnvelope::parse(&text) {
            if env.is_response() {
                self.heartbeat.record_pong();
                return;
            }
        }

        self.forward_frame(text).await;
    }

    /// Forward a data frame to the classifier pipeline. The send is awaited,
    /// so a slow consumer back-pressures the socket read instead of frames
    /// being dropped.
    async fn forward_frame(&self, text: String) {
        *self.last_event_at.write() = Some(Utc::now());
        if self.frame_tx.send(RawFrame::new(text)).await.is_err() {
            warn!(purpose = %self.config.purpose, "frame receiver dropped");
        }
    }
}

fn close_details(
    frame: Option<tokio_tungstenite::tungstenite::protocol::CloseFrame<'_>>,
) -> (u16, String) {
    frame
        .map(|f| (f.code.into(), f.reason.to_string()))
        .unwrap_or((1005, "no close frame".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoints: Vec<String>) -> StreamConfig {
        StreamConfig {
            purpose: "whale-monitor".to_string(),
            endpoints,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_endpoints_rejected() {
        let (tx, _rx) = mpsc::channel(8);
        assert!(StreamSupervisor::new(config(Vec::new()), tx).is_err());
    }

    #[test]
    fn test_empty_purpose_rejected() {
        let (tx, _rx) = mpsc::channel(8);
        let cfg = StreamConfig {
            endpoints: vec!["wss://feed.example.net".to_string()],
            ..Default::default()
        };
        assert!(StreamSupervisor::new(cfg, tx).is_err());
    }

    #[test]
    fn test_initial_health() {
        let (tx, _rx) = mpsc::channel(8);
        let sup =
            StreamSupervisor::new(config(vec!["wss://feed.example.net".to_string()]), tx).unwrap();
        let health = sup.health();
        assert_eq!(health.purpose, "whale-monitor");
        assert_eq!(health.connection_state, ConnectionState::Idle);
        assert_eq!(health.reconnect_attempts, 0);
        assert!(health.last_event_at.is_none());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (tx, _rx) = mpsc::channel(8);
        let sup =
            StreamSupervisor::new(config(vec!["wss://feed.example.net".to_string()]), tx).unwrap();
        sup.stop();
        sup.stop();
        assert!(sup.is_stopped());
        // a stopped supervisor's run() returns immediately
        sup.run().await;
        assert_eq!(sup.state(), ConnectionState::Idle);
    }
}
