//! Wire structs for the ledger transaction stream.
//!
//! The feed wraps each validated transaction in a frame:
//! `{"type": "transaction", "transaction": {"TransactionType": "Payment",
//! "Account": ..., "Destination": ..., "Amount": ..., "hash": ...}}`.
//! Native amounts arrive as drop strings, issued currencies as
//! `{currency, value, issuer}` objects.

use crate::error::{FeedError, FeedResult};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Drops per canonical native unit.
const DROPS_PER_UNIT: u64 = 1_000_000;

/// Native currency code used after drop normalization.
pub const NATIVE_CURRENCY: &str = "XRP";

/// Top-level feed frame.
#[derive(Debug, Deserialize)]
pub struct TransactionFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub transaction: Option<TransactionBody>,
}

impl TransactionFrame {
    pub fn parse(payload: &str) -> FeedResult<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    pub fn is_transaction(&self) -> bool {
        self.frame_type == "transaction"
    }
}

/// Transaction body; field names follow the feed's canonical casing.
#[derive(Debug, Deserialize)]
pub struct TransactionBody {
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Account", default)]
    pub account: Option<String>,
    #[serde(rename = "Destination", default)]
    pub destination: Option<String>,
    #[serde(rename = "Amount", default)]
    pub amount: Option<WireAmount>,
    #[serde(rename = "hash", default)]
    pub hash: Option<String>,
}

/// Amount as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireAmount {
    /// Native amount, integer drop count as a string.
    Drops(String),
    /// Issued currency amount.
    Issued {
        currency: String,
        value: String,
        #[serde(default)]
        issuer: Option<String>,
    },
}

/// Amount normalized to canonical units.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAmount {
    pub amount: Decimal,
    pub currency: String,
}

impl NormalizedAmount {
    /// Decimal digits of the canonical amount, the representation the
    /// suspicious-pattern policy inspects. Drop strings carry zero runs that
    /// are an artifact of the unit, so the policy never sees them.
    pub fn digits(&self) -> String {
        self.amount.to_string()
    }
}

impl WireAmount {
    /// Normalize to canonical units: drops divide by 10^6 into native units,
    /// issued values pass through with their currency code.
    pub fn normalize(&self) -> FeedResult<NormalizedAmount> {
        match self {
            Self::Drops(drops) => {
                let raw: Decimal = drops
                    .parse()
                    .map_err(|_| FeedError::InvalidAmount(drops.clone()))?;
                if raw.is_sign_negative() || !raw.fract().is_zero() {
                    return Err(FeedError::InvalidAmount(drops.clone()));
                }
                Ok(NormalizedAmount {
                    amount: raw / Decimal::from(DROPS_PER_UNIT),
                    currency: NATIVE_CURRENCY.to_string(),
                })
            }
            Self::Issued { currency, value, .. } => {
                let amount: Decimal = value
                    .parse()
                    .map_err(|_| FeedError::InvalidAmount(value.clone()))?;
                if amount.is_sign_negative() {
                    return Err(FeedError::InvalidAmount(value.clone()));
                }
                Ok(NormalizedAmount {
                    amount,
                    currency: currency.clone(),
                })
            }
        }
    }
}
