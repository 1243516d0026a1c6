//! Wire request and envelope types for the ledger feed.
//!
//! The feed speaks JSON command frames: a subscribe request opens the
//! transaction stream, periodic pings keep quiet connections verifiably
//! alive, and every command is answered with a `type: "response"` frame
//! carrying the request id.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// Outgoing command frame.
#[derive(Debug, Clone, Serialize)]
pub struct FeedRequest {
    /// Request id for response correlation.
    pub id: u64,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streams: Option<Vec<String>>,
}

impl FeedRequest {
    /// Subscribe to the named feed streams (e.g. `["transactions"]`).
    pub fn subscribe(streams: &[String]) -> Self {
        Self {
            id: next_request_id(),
            command: "subscribe".to_string(),
            streams: Some(streams.to_vec()),
        }
    }

    /// Liveness probe.
    pub fn ping() -> Self {
        Self {
            id: next_request_id(),
            command: "ping".to_string(),
            streams: None,
        }
    }
}

/// Minimal inbound frame envelope.
///
/// The supervisor only needs enough structure to route frames: command
/// responses (subscribe acks, pongs) are consumed internally, everything
/// else is forwarded downstream for classification.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameEnvelope {
    #[serde(rename = "type")]
    pub frame_type: Option<String>,
    pub status: Option<String>,
    pub id: Option<u64>,
}

impl FrameEnvelope {
    /// Best-effort parse; unparseable frames are not responses.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    /// Whether this frame is a command response (ack or pong).
    pub fn is_response(&self) -> bool {
        self.frame_type.as_deref() == Some("response")
    }

    /// Whether a command response reports success. Responses without a
    /// status field are treated as success.
    pub fn is_success(&self) -> bool {
        match self.status.as_deref() {
            Some(status) => status == "success",
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_request_shape() {
        let req = FeedRequest::subscribe(&["transactions".to_string()]);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"command\":\"subscribe\""));
        assert!(json.contains("\"streams\":[\"transactions\"]"));
    }

    #[test]
    fn test_ping_omits_streams() {
        let json = serde_json::to_string(&FeedRequest::ping()).unwrap();
        assert!(json.contains("\"command\":\"ping\""));
        assert!(!json.contains("streams"));
    }

    #[test]
    fn test_request_ids_increase() {
        let a = FeedRequest::ping().id;
        let b = FeedRequest::ping().id;
        assert!(b > a);
    }

    #[test]
    fn test_envelope_response_detection() {
        let env = FrameEnvelope::parse(r#"{"id":3,"type":"response","status":"success"}"#).unwrap();
        assert!(env.is_response());
        assert!(env.is_success());

        let env = FrameEnvelope::parse(r#"{"type":"response","status":"error"}"#).unwrap();
        assert!(env.is_response());
        assert!(!env.is_success());

        let env = FrameEnvelope::parse(r#"{"type":"transaction"}"#).unwrap();
        assert!(!env.is_response());
    }

    #[test]
    fn test_envelope_tolerates_garbage() {
        assert!(FrameEnvelope::parse("not json").is_none());
    }
}
