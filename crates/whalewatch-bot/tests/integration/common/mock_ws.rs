//! Mock ledger feed server for integration tests.
//!
//! A small WebSocket server that speaks just enough of the feed protocol:
//! - Acks `subscribe` and `ping` commands with `{"type":"response",...}`
//! - Records every received text message
//! - Can drop the first N TCP connections (fault injection)
//! - Can go silent after the subscribe ack (heartbeat testing)
//! - Can broadcast transaction frames to all connected clients

use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Server fault/behavior knobs.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Drop this many TCP connections before accepting any.
    pub fail_first: u32,
    /// Ack the subscribe command, then never respond to anything again.
    pub silent_after_ack: bool,
    /// Record commands but never respond, stalling the handshake.
    pub ignore_commands: bool,
}

/// A mock feed server for testing.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<AtomicU32>,
    frame_tx: broadcast::Sender<String>,
}

impl MockWsServer {
    /// Start a well-behaved server on an available port.
    pub async fn start() -> Self {
        Self::start_with(MockBehavior::default()).await
    }

    /// Start a server with fault injection.
    pub async fn start_with(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let connections = Arc::new(AtomicU32::new(0));
        let remaining_failures = Arc::new(AtomicU32::new(behavior.fail_first));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (frame_tx, _) = broadcast::channel::<String>(64);

        let messages_clone = messages.clone();
        let connections_clone = connections.clone();
        let frame_tx_clone = frame_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        connections_clone.fetch_add(1, Ordering::SeqCst);

                        // fault injection: drop before the WS handshake
                        let failures = remaining_failures.load(Ordering::SeqCst);
                        if failures > 0 {
                            remaining_failures.store(failures - 1, Ordering::SeqCst);
                            drop(stream);
                            continue;
                        }

                        let messages = messages_clone.clone();
                        let frames = frame_tx_clone.subscribe();
                        let behavior = behavior.clone();
                        tokio::spawn(handle_connection(stream, messages, behavior, frames));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            messages,
            connections,
            frame_tx,
        }
    }

    /// Get the server's WebSocket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of TCP connections received (including dropped ones).
    pub fn connection_count(&self) -> u32 {
        self.connections.load(Ordering::SeqCst)
    }

    /// All received text messages.
    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.iter().cloned().collect()
    }

    /// Broadcast a data frame to every connected client.
    pub fn send_frame(&self, frame: impl Into<String>) {
        let _ = self.frame_tx.send(frame.into());
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    messages: Arc<Mutex<VecDeque<String>>>,
    behavior: MockBehavior,
    mut frames: broadcast::Receiver<String>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let mut acked_subscribe = false;

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    {
                        let mut msgs = messages.lock().await;
                        msgs.push_back(text.clone());
                    }

                    if behavior.ignore_commands || (behavior.silent_after_ack && acked_subscribe) {
                        continue;
                    }

                    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&text) {
                        let command = parsed.get("command").and_then(|c| c.as_str());
                        let id = parsed.get("id").cloned().unwrap_or(serde_json::json!(0));
                        match command {
                            Some("subscribe") => {
                                let response = serde_json::json!({
                                    "id": id,
                                    "type": "response",
                                    "status": "success",
                                });
                                let _ = write.send(Message::Text(response.to_string())).await;
                                acked_subscribe = true;
                            }
                            Some("ping") => {
                                let response = serde_json::json!({
                                    "id": id,
                                    "type": "response",
                                    "status": "success",
                                });
                                let _ = write.send(Message::Text(response.to_string())).await;
                            }
                            _ => {}
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if !behavior.silent_after_ack {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },

            frame = frames.recv() => {
                if let Ok(frame) = frame {
                    if write.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockWsServer::start().await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        server.shutdown().await;
    }
}
