//! Application configuration.

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use whalewatch_feed::{ClassifierConfig, SuspiciousAmountPolicy};
use whalewatch_stream::StreamConfig;

/// One monitored feed stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Stream name, used in logs, metrics labels and the health surface.
    pub purpose: String,
    /// Equivalent feed endpoints, tried in round-robin order on failure.
    pub endpoints: Vec<String>,
    /// Inclusive lower bound on normalized transfer amounts.
    pub min_threshold: Decimal,
    /// Inclusive upper bound on normalized transfer amounts.
    pub max_threshold: Decimal,
    /// Feed streams named in the subscribe handshake.
    #[serde(default = "default_subscribe_streams")]
    pub subscribe_streams: Vec<String>,
    /// Bound on opening the transport (ms).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Bound on the subscribe handshake ack (ms).
    #[serde(default = "default_subscribe_timeout_ms")]
    pub subscribe_timeout_ms: u64,
    /// Heartbeat probe interval (ms); liveness timeout is twice this.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Base delay for reconnect backoff (ms).
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Ceiling for reconnect backoff (ms).
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Uniform jitter span as a fraction of the pre-jitter delay.
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
    /// Consecutive failures before the circuit opens.
    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,
    /// Cool-down before the open circuit admits a half-open probe (ms).
    #[serde(default = "default_circuit_reset_after_ms")]
    pub circuit_reset_after_ms: u64,
    /// Bounded frame channel between the supervisor and the classifier.
    #[serde(default = "default_frame_buffer")]
    pub frame_buffer: usize,
    /// Recent-id window size for duplicate rejection.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// Suspicious digit-run policy.
    #[serde(default)]
    pub suspicious: SuspiciousAmountPolicy,
}

fn default_subscribe_streams() -> Vec<String> {
    vec!["transactions".to_string()]
}

fn default_connect_timeout_ms() -> u64 {
    20_000
}

fn default_subscribe_timeout_ms() -> u64 {
    10_000
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    300_000
}

fn default_jitter_factor() -> f64 {
    0.5
}

fn default_circuit_failure_threshold() -> u32 {
    5
}

fn default_circuit_reset_after_ms() -> u64 {
    60_000
}

fn default_frame_buffer() -> usize {
    1_000
}

fn default_dedup_capacity() -> usize {
    4_096
}

impl StreamSettings {
    /// Supervisor configuration for this stream.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            purpose: self.purpose.clone(),
            endpoints: self.endpoints.clone(),
            subscribe_streams: self.subscribe_streams.clone(),
            connect_timeout_ms: self.connect_timeout_ms,
            subscribe_timeout_ms: self.subscribe_timeout_ms,
            heartbeat_interval_ms: self.heartbeat_interval_ms,
            backoff_base_ms: self.backoff_base_ms,
            backoff_max_ms: self.backoff_max_ms,
            jitter_factor: self.jitter_factor,
            circuit_failure_threshold: self.circuit_failure_threshold,
            circuit_reset_after_ms: self.circuit_reset_after_ms,
        }
    }

    /// Classifier configuration for this stream.
    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            min_threshold: self.min_threshold,
            max_threshold: self.max_threshold,
            dedup_capacity: self.dedup_capacity,
            suspicious: self.suspicious.clone(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level applied when RUST_LOG is not set.
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Grace period before straggler stream tasks are aborted (ms).
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
}

fn default_grace_ms() -> u64 {
    30_000
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_ms: default_grace_ms(),
        }
    }
}

/// Alert pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Bounded event channel between the pipelines and the dispatcher.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_event_buffer() -> usize {
    256
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Monitored streams.
    #[serde(default)]
    pub streams: Vec<StreamSettings>,
    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Shutdown configuration.
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    /// Alert pipeline configuration.
    #[serde(default)]
    pub alert: AlertConfig,
}

impl AppConfig {
    /// Load configuration, resolving the path from the WHALEWATCH_CONFIG
    /// env var with a conventional default.
    pub fn load() -> AppResult<Self> {
        let config_path = std::env::var("WHALEWATCH_CONFIG")
            .unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            Err(AppError::Config(format!(
                "config file not found: {config_path}"
            )))
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot run. Fatal at startup: a monitor
    /// that silently drops a misconfigured stream is worse than one that
    /// refuses to start.
    pub fn validate(&self) -> AppResult<()> {
        if self.streams.is_empty() {
            return Err(AppError::Config("no streams configured".to_string()));
        }

        let mut purposes = HashSet::new();
        for stream in &self.streams {
            if stream.purpose.is_empty() {
                return Err(AppError::Config("stream purpose must not be empty".to_string()));
            }
            if !purposes.insert(stream.purpose.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate stream purpose: {}",
                    stream.purpose
                )));
            }
            if stream.endpoints.is_empty() {
                return Err(AppError::Config(format!(
                    "stream {} has no endpoints",
                    stream.purpose
                )));
            }
            if stream.min_threshold > stream.max_threshold {
                return Err(AppError::Config(format!(
                    "stream {}: min_threshold {} exceeds max_threshold {}",
                    stream.purpose, stream.min_threshold, stream.max_threshold
                )));
            }
            if stream.min_threshold.is_sign_negative() {
                return Err(AppError::Config(format!(
                    "stream {}: min_threshold must not be negative",
                    stream.purpose
                )));
            }
            if stream.heartbeat_interval_ms == 0
                || stream.connect_timeout_ms == 0
                || stream.subscribe_timeout_ms == 0
            {
                return Err(AppError::Config(format!(
                    "stream {}: timeouts and intervals must be positive",
                    stream.purpose
                )));
            }
            if stream.frame_buffer == 0 || stream.dedup_capacity == 0 {
                return Err(AppError::Config(format!(
                    "stream {}: buffer sizes must be positive",
                    stream.purpose
                )));
            }
        }
        Ok(())
    }
}
