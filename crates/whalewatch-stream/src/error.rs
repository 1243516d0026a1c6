//! Stream error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Connect timed out")]
    ConnectTimeout,

    #[error("Subscribe handshake timed out")]
    SubscribeTimeout,

    #[error("Subscribe rejected: {0}")]
    SubscribeRejected(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Heartbeat timeout")]
    HeartbeatTimeout,

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StreamError {
    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ConnectTimeout => "connect_timeout",
            Self::SubscribeTimeout => "subscribe_timeout",
            Self::SubscribeRejected(_) => "subscribe_rejected",
            Self::ConnectionClosed { .. } => "connection_closed",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::Tungstenite(_) => "transport_error",
            Self::Json(_) => "encode_error",
        }
    }
}

pub type StreamResult<T> = Result<T, StreamError>;
