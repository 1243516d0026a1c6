//! Suspicious-amount policy.
//!
//! Heuristic filter against feed test/noise traffic: synthetic amounts tend
//! to be keyboard mashes like `9999999999` or `1000000000000`. The digit-run
//! thresholds are deliberately configuration, not constants; they are a
//! guess at testnet noise and may need tuning per deployment.

use serde::{Deserialize, Serialize};

/// Digit-run thresholds. A threshold of 0 disables that check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousAmountPolicy {
    /// Minimum run of an identical digit 1-8 considered synthetic.
    #[serde(default = "default_repeat_run")]
    pub repeat_run: usize,
    /// Minimum run of 9s or 0s considered synthetic. Looser than
    /// `repeat_run`: round amounts carry natural zero runs, and prices
    /// rounding just under a threshold carry nine runs.
    #[serde(default = "default_edge_run")]
    pub edge_run: usize,
}

fn default_repeat_run() -> usize {
    7
}

fn default_edge_run() -> usize {
    8
}

impl Default for SuspiciousAmountPolicy {
    fn default() -> Self {
        Self {
            repeat_run: default_repeat_run(),
            edge_run: default_edge_run(),
        }
    }
}

impl SuspiciousAmountPolicy {
    /// Check the canonical decimal representation of an amount. Runs are
    /// counted over consecutive identical digits; any non-digit breaks the
    /// run. 9s and 0s are judged by `edge_run`, every other digit by
    /// `repeat_run`.
    pub fn is_suspicious(&self, digits: &str) -> bool {
        let mut run_digit = ' ';
        let mut run_len = 0usize;

        for c in digits.chars() {
            if !c.is_ascii_digit() {
                run_len = 0;
                continue;
            }
            if c == run_digit {
                run_len += 1;
            } else {
                run_digit = c;
                run_len = 1;
            }

            let threshold = if c == '9' || c == '0' {
                self.edge_run
            } else {
                self.repeat_run
            };
            if threshold > 0 && run_len >= threshold {
                return true;
            }
        }

        false
    }
}
