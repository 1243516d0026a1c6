//! Whale-transfer classifier.
//!
//! Stateless predicate + transform from raw frames to `TransferEvent`s,
//! aside from the bounded recent-id set. Performs no I/O and never blocks;
//! parse failures are counted, not escalated, and never affect connection
//! health.

use crate::parser::TransactionFrame;
use crate::policy::SuspiciousAmountPolicy;
use crate::recent::RecentIdSet;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};
use whalewatch_core::{Account, CoreError, RawFrame, TransferEvent};

/// Classifier thresholds and policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Inclusive lower bound on the normalized amount.
    pub min_threshold: Decimal,
    /// Inclusive upper bound on the normalized amount.
    pub max_threshold: Decimal,
    /// Recent-id window size for duplicate rejection.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    #[serde(default)]
    pub suspicious: SuspiciousAmountPolicy,
}

fn default_dedup_capacity() -> usize {
    4096
}

impl ClassifierConfig {
    /// Threshold sanity is fatal at construction time.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.min_threshold.is_sign_negative() {
            return Err(CoreError::InvalidConfig(
                "min_threshold must not be negative".to_string(),
            ));
        }
        if self.min_threshold > self.max_threshold {
            return Err(CoreError::InvalidConfig(format!(
                "min_threshold {} exceeds max_threshold {}",
                self.min_threshold, self.max_threshold
            )));
        }
        if self.dedup_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "dedup_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Rejection and acceptance counters, shared read-only with telemetry.
#[derive(Debug, Default)]
pub struct ClassifierStats {
    pub parse_errors: AtomicU64,
    pub rejected_type: AtomicU64,
    pub rejected_missing_fields: AtomicU64,
    pub rejected_self_transfer: AtomicU64,
    pub rejected_out_of_range: AtomicU64,
    pub rejected_suspicious: AtomicU64,
    pub rejected_duplicate: AtomicU64,
    pub accepted: AtomicU64,
}

/// Point-in-time copy of the counters, for delta reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierSnapshot {
    pub parse_errors: u64,
    pub rejected_type: u64,
    pub rejected_missing_fields: u64,
    pub rejected_self_transfer: u64,
    pub rejected_out_of_range: u64,
    pub rejected_suspicious: u64,
    pub rejected_duplicate: u64,
    pub accepted: u64,
}

impl ClassifierStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ClassifierSnapshot {
        ClassifierSnapshot {
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            rejected_type: self.rejected_type.load(Ordering::Relaxed),
            rejected_missing_fields: self.rejected_missing_fields.load(Ordering::Relaxed),
            rejected_self_transfer: self.rejected_self_transfer.load(Ordering::Relaxed),
            rejected_out_of_range: self.rejected_out_of_range.load(Ordering::Relaxed),
            rejected_suspicious: self.rejected_suspicious.load(Ordering::Relaxed),
            rejected_duplicate: self.rejected_duplicate.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
        }
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejected_type.load(Ordering::Relaxed)
            + self.rejected_missing_fields.load(Ordering::Relaxed)
            + self.rejected_self_transfer.load(Ordering::Relaxed)
            + self.rejected_out_of_range.load(Ordering::Relaxed)
            + self.rejected_suspicious.load(Ordering::Relaxed)
            + self.rejected_duplicate.load(Ordering::Relaxed)
    }
}

/// Classifies raw frames into whale transfer events.
///
/// Owned by exactly one pipeline task; the recent-id set is therefore
/// mutated without locking.
pub struct TransferClassifier {
    config: ClassifierConfig,
    recent: RecentIdSet,
    stats: Arc<ClassifierStats>,
}

impl TransferClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let recent = RecentIdSet::new(config.dedup_capacity);
        Ok(Self {
            config,
            recent,
            stats: Arc::new(ClassifierStats::default()),
        })
    }

    /// Shared handle to the counters.
    pub fn stats(&self) -> Arc<ClassifierStats> {
        self.stats.clone()
    }

    /// Classify one frame: zero or one event.
    pub fn classify(&mut self, frame: &RawFrame) -> Option<TransferEvent> {
        let parsed = match TransactionFrame::parse(&frame.payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                ClassifierStats::bump(&self.stats.parse_errors);
                debug!(error = %e, "unparseable frame dropped");
                return None;
            }
        };

        if !parsed.is_transaction() {
            ClassifierStats::bump(&self.stats.rejected_type);
            return None;
        }
        let tx = match parsed.transaction {
            Some(tx) if tx.transaction_type == "Payment" => tx,
            _ => {
                ClassifierStats::bump(&self.stats.rejected_type);
                return None;
            }
        };

        let (account, destination, amount, hash) =
            match (tx.account, tx.destination, tx.amount, tx.hash) {
                (Some(a), Some(d), Some(m), Some(h)) => (a, d, m, h),
                _ => {
                    ClassifierStats::bump(&self.stats.rejected_missing_fields);
                    return None;
                }
            };

        if account == destination {
            ClassifierStats::bump(&self.stats.rejected_self_transfer);
            trace!(account = %account, "self-transfer rejected");
            return None;
        }

        let normalized = match amount.normalize() {
            Ok(n) => n,
            Err(e) => {
                ClassifierStats::bump(&self.stats.parse_errors);
                debug!(error = %e, "frame with bad amount dropped");
                return None;
            }
        };

        if normalized.amount < self.config.min_threshold
            || normalized.amount > self.config.max_threshold
        {
            ClassifierStats::bump(&self.stats.rejected_out_of_range);
            return None;
        }

        let digits = normalized.digits();
        if self.config.suspicious.is_suspicious(&digits) {
            ClassifierStats::bump(&self.stats.rejected_suspicious);
            debug!(amount = %digits, "suspicious amount pattern rejected");
            return None;
        }

        if !self.recent.insert(&hash) {
            ClassifierStats::bump(&self.stats.rejected_duplicate);
            trace!(hash = %hash, "duplicate reference id rejected");
            return None;
        }

        ClassifierStats::bump(&self.stats.accepted);
        Some(TransferEvent {
            source: Account::new(account),
            destination: Account::new(destination),
            amount: normalized.amount,
            currency: normalized.currency,
            reference_id: hash,
            observed_at: frame.received_at,
        })
    }
}
