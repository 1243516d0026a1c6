//! Whale transfer monitor.
//!
//! Main application that orchestrates all components:
//! - Supervised WebSocket streams to the ledger feed
//! - Frame classification into whale transfer events
//! - Alert dispatch
//! - Health snapshots and Prometheus metrics

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, StreamSettings};
pub use error::{AppError, AppResult};
