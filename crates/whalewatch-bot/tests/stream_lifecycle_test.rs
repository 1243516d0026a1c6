//! Stream lifecycle integration tests.
//!
//! Exercises the supervisor against a mock feed server:
//! - Connection and subscribe handshake
//! - Circuit breaker opening and recovering
//! - Heartbeat-silence reconnects
//! - Idempotent stop during backoff
//! - Frame flow into the classifier

mod integration;
use integration::common::mock_ws::{MockBehavior, MockWsServer};

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use whalewatch_core::{BreakerState, ConnectionState, RawFrame};
use whalewatch_feed::{ClassifierConfig, SuspiciousAmountPolicy, TransferClassifier};
use whalewatch_stream::{StreamConfig, StreamSupervisor};

fn test_config(endpoints: Vec<String>) -> StreamConfig {
    StreamConfig {
        purpose: "whale-monitor".to_string(),
        endpoints,
        connect_timeout_ms: 1_000,
        subscribe_timeout_ms: 1_000,
        backoff_base_ms: 50,
        backoff_max_ms: 500,
        jitter_factor: 0.0,
        ..Default::default()
    }
}

/// Poll until the condition holds or the timeout elapses.
async fn wait_for<F: FnMut() -> bool>(limit: Duration, mut condition: F) -> bool {
    timeout(limit, async {
        loop {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn test_connects_and_subscribes() {
    let server = MockWsServer::start().await;

    let (frame_tx, _frame_rx) = mpsc::channel::<RawFrame>(64);
    let sup = Arc::new(StreamSupervisor::new(test_config(vec![server.url()]), frame_tx).unwrap());

    let runner = sup.clone();
    let task = tokio::spawn(async move { runner.run().await });

    assert!(
        wait_for(Duration::from_secs(2), || sup.state()
            == ConnectionState::Connected)
        .await,
        "should reach Connected"
    );

    let messages = server.received_messages().await;
    let subscribe = messages
        .iter()
        .find(|m| m.contains("\"command\":\"subscribe\""))
        .expect("should have sent a subscribe command");
    assert!(subscribe.contains("transactions"));

    sup.stop();
    timeout(Duration::from_secs(1), task)
        .await
        .expect("run loop should exit after stop")
        .unwrap();
    server.shutdown().await;
}

/// Two dropped connections open the breaker (threshold 2); after the
/// cool-down a single half-open probe succeeds and the stream recovers
/// with a cleared attempt counter.
#[tokio::test]
async fn test_breaker_opens_then_recovers() {
    let server = MockWsServer::start_with(MockBehavior {
        fail_first: 2,
        ..Default::default()
    })
    .await;

    let mut config = test_config(vec![server.url(), server.url()]);
    config.circuit_failure_threshold = 2;
    config.circuit_reset_after_ms = 300;

    let (frame_tx, _frame_rx) = mpsc::channel::<RawFrame>(64);
    let sup = Arc::new(StreamSupervisor::new(config, frame_tx).unwrap());

    let runner = sup.clone();
    let task = tokio::spawn(async move { runner.run().await });

    assert!(
        wait_for(Duration::from_secs(2), || sup.health().breaker.state
            == BreakerState::Open)
        .await,
        "breaker should open after two dropped connections"
    );

    assert!(
        wait_for(Duration::from_secs(5), || {
            let health = sup.health();
            health.connection_state == ConnectionState::Connected
                && health.breaker.state == BreakerState::Closed
                && health.reconnect_attempts == 0
        })
        .await,
        "stream should recover through the half-open probe"
    );

    // two dropped connects plus the successful probe
    assert_eq!(server.connection_count(), 3);

    sup.stop();
    timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    server.shutdown().await;
}

/// A server that acks the subscribe and then goes silent must be detected
/// by the heartbeat and reconnected.
#[tokio::test]
async fn test_heartbeat_silence_triggers_reconnect() {
    let server = MockWsServer::start_with(MockBehavior {
        silent_after_ack: true,
        ..Default::default()
    })
    .await;

    let mut config = test_config(vec![server.url()]);
    config.heartbeat_interval_ms = 100;

    let (frame_tx, _frame_rx) = mpsc::channel::<RawFrame>(64);
    let sup = Arc::new(StreamSupervisor::new(config, frame_tx).unwrap());

    let runner = sup.clone();
    let task = tokio::spawn(async move { runner.run().await });

    assert!(
        wait_for(Duration::from_secs(5), || server.connection_count() >= 2).await,
        "silent connection should be torn down and redialed"
    );

    sup.stop();
    timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    server.shutdown().await;
}

/// Stopping mid-handshake (server never acks the subscribe) must not count
/// as a successful connection: the failure history survives the shutdown.
#[tokio::test]
async fn test_stop_during_subscribe_keeps_failure_history() {
    let server = MockWsServer::start_with(MockBehavior {
        fail_first: 1,
        ignore_commands: true,
        ..Default::default()
    })
    .await;

    let mut config = test_config(vec![server.url()]);
    config.subscribe_timeout_ms = 5_000;

    let (frame_tx, _frame_rx) = mpsc::channel::<RawFrame>(64);
    let sup = Arc::new(StreamSupervisor::new(config, frame_tx).unwrap());

    let runner = sup.clone();
    let task = tokio::spawn(async move { runner.run().await });

    // first connect is dropped; the second reaches the handshake and stalls
    assert!(
        wait_for(Duration::from_secs(2), || server.connection_count() >= 2).await,
        "second connection should reach the stalled handshake"
    );
    tokio::time::sleep(Duration::from_millis(200)).await;
    sup.stop();

    timeout(Duration::from_secs(1), task)
        .await
        .expect("stop must interrupt the handshake")
        .unwrap();
    assert_eq!(sup.state(), ConnectionState::Idle);
    // the dropped first connect is still on the books
    assert_eq!(sup.health().reconnect_attempts, 1);
    server.shutdown().await;
}

/// Stop during a pending backoff sleep must end the loop promptly; a second
/// stop is a no-op.
#[tokio::test]
async fn test_stop_idempotent_during_backoff() {
    // unroutable endpoint, long backoff: the supervisor fails fast and then
    // sits in the backoff sleep
    let mut config = test_config(vec!["ws://127.0.0.1:9".to_string()]);
    config.connect_timeout_ms = 500;
    config.backoff_base_ms = 5_000;
    config.backoff_max_ms = 5_000;

    let (frame_tx, _frame_rx) = mpsc::channel::<RawFrame>(64);
    let sup = Arc::new(StreamSupervisor::new(config, frame_tx).unwrap());

    let runner = sup.clone();
    let task = tokio::spawn(async move { runner.run().await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    sup.stop();
    sup.stop();

    timeout(Duration::from_secs(1), task)
        .await
        .expect("stop must interrupt the backoff sleep")
        .unwrap();
    assert_eq!(sup.state(), ConnectionState::Idle);
}

/// Data frames forwarded by the supervisor classify into events; a
/// redelivered hash is deduplicated.
#[tokio::test]
async fn test_frames_flow_to_classifier() {
    let server = MockWsServer::start().await;

    let (frame_tx, mut frame_rx) = mpsc::channel::<RawFrame>(64);
    let sup = Arc::new(StreamSupervisor::new(test_config(vec![server.url()]), frame_tx).unwrap());

    let runner = sup.clone();
    let task = tokio::spawn(async move { runner.run().await });

    assert!(
        wait_for(Duration::from_secs(2), || sup.state()
            == ConnectionState::Connected)
        .await
    );

    let payment = r#"{"type":"transaction","transaction":{"TransactionType":"Payment","Account":"rAlice","Destination":"rBob","Amount":"200000000000","hash":"E2E1"}}"#;
    server.send_frame(payment);

    let frame = timeout(Duration::from_secs(2), frame_rx.recv())
        .await
        .expect("frame should arrive")
        .expect("channel open");

    let mut classifier = TransferClassifier::new(ClassifierConfig {
        min_threshold: dec!(100000),
        max_threshold: dec!(50000000),
        dedup_capacity: 64,
        suspicious: SuspiciousAmountPolicy::default(),
    })
    .unwrap();

    let event = classifier.classify(&frame).expect("payment should classify");
    assert_eq!(event.amount, dec!(200000));
    assert_eq!(event.currency, "XRP");
    assert_eq!(event.reference_id, "E2E1");

    // redelivery of the same hash is rejected
    server.send_frame(payment);
    let duplicate = timeout(Duration::from_secs(2), frame_rx.recv())
        .await
        .expect("frame should arrive")
        .expect("channel open");
    assert!(classifier.classify(&duplicate).is_none());

    sup.stop();
    timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    server.shutdown().await;
}
