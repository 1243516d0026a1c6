//! Integration tests for whalewatch-bot.
//!
//! These tests verify the interaction between components:
//! - Stream supervision lifecycle against a mock feed
//! - Circuit breaker recovery end to end
//! - Frame flow into the classifier

pub mod common;
