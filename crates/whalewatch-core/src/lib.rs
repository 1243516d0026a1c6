//! Core domain types for the whalewatch ingestion pipeline.
//!
//! This crate provides the fundamental types shared across the system:
//! - `Account`: ledger account identifier
//! - `RawFrame`, `TransferEvent`: the wire payload and the classified event
//! - `ConnectionState`: per-stream lifecycle state
//! - `StreamHealth`, `BreakerSnapshot`: read-only health surface

pub mod error;
pub mod types;

pub use error::{CoreError, Result};
pub use types::{
    Account, BreakerSnapshot, BreakerState, ConnectionState, RawFrame, StreamHealth,
    TransferEvent,
};
