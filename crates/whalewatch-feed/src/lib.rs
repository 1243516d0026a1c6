//! Frame parsing and whale-transfer classification.
//!
//! Turns raw feed payloads into typed `TransferEvent`s:
//! - serde wire structs for the ledger transaction stream
//! - amount normalization (native drops to canonical units)
//! - threshold, self-transfer and suspicious-pattern filters
//! - bounded recent-id dedup against feed redelivery

pub mod classifier;
pub mod error;
pub mod parser;
pub mod policy;
pub mod recent;

pub use classifier::{ClassifierConfig, ClassifierSnapshot, ClassifierStats, TransferClassifier};
pub use error::{FeedError, FeedResult};
pub use parser::{NormalizedAmount, TransactionBody, TransactionFrame, WireAmount};
pub use policy::SuspiciousAmountPolicy;
pub use recent::RecentIdSet;
