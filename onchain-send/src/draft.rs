//! Transaction Draft
//!
//! The in-progress send as the user edits it, and the finalized shape handed
//! to the dispatch boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the fee is chosen. Only one of the two can ever be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeMode {
    /// Desired confirmation target, in blocks
    TargetBlocks(u32),
    /// Explicit fee rate, in base units per byte
    FeeRate(u64),
}

impl FeeMode {
    pub fn kind(&self) -> FeeModeKind {
        match self {
            FeeMode::TargetBlocks(_) => FeeModeKind::TargetBlocks,
            FeeMode::FeeRate(_) => FeeModeKind::FeeRate,
        }
    }

    pub fn is_positive(&self) -> bool {
        match self {
            FeeMode::TargetBlocks(blocks) => *blocks > 0,
            FeeMode::FeeRate(rate) => *rate > 0,
        }
    }
}

/// Fee mode selector shown next to the fee input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeModeKind {
    #[default]
    TargetBlocks,
    FeeRate,
}

impl fmt::Display for FeeModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeModeKind::TargetBlocks => write!(f, "Target Confirmation Blocks"),
            FeeModeKind::FeeRate => write!(f, "Fee"),
        }
    }
}

/// Mutable record of the send being composed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionDraft {
    /// Recipient address
    pub address: String,
    /// Amount in the selected display unit. Base units once normalized.
    pub amount: f64,
    /// Whether the whole balance is being swept
    pub send_all: bool,
    pub fee: Option<FeeMode>,
}

impl TransactionDraft {
    /// True when nothing has been entered
    pub fn is_empty(&self) -> bool {
        self.address.is_empty() && self.amount == 0.0 && !self.send_all && self.fee.is_none()
    }

    /// Amount truncated to whole base units
    pub fn base_amount(&self) -> u64 {
        if self.amount.is_finite() && self.amount > 0.0 {
            self.amount.trunc() as u64
        } else {
            0
        }
    }

    /// Freeze the draft into the shape submitted to the node.
    ///
    /// Returns `None` if no fee mode was chosen.
    pub fn finalize(&self) -> Option<FinalizedTransaction> {
        Some(FinalizedTransaction {
            address: self.address.clone(),
            amount: self.base_amount(),
            send_all: self.send_all,
            fee: self.fee?,
        })
    }
}

/// A draft after confirmation, ready for submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedTransaction {
    pub address: String,
    /// Amount in base units
    pub amount: u64,
    pub send_all: bool,
    pub fee: FeeMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_draft() {
        assert!(TransactionDraft::default().is_empty());

        let draft = TransactionDraft {
            address: "bc1qtest".to_string(),
            ..Default::default()
        };
        assert!(!draft.is_empty());
    }

    #[test]
    fn test_base_amount_truncates() {
        let draft = TransactionDraft {
            amount: 1234.99,
            ..Default::default()
        };
        assert_eq!(draft.base_amount(), 1234);

        let negative = TransactionDraft {
            amount: -5.0,
            ..Default::default()
        };
        assert_eq!(negative.base_amount(), 0);
    }

    #[test]
    fn test_finalize_requires_fee() {
        let mut draft = TransactionDraft {
            address: "bc1qtest".to_string(),
            amount: 50_000.0,
            ..Default::default()
        };
        assert!(draft.finalize().is_none());

        draft.fee = Some(FeeMode::FeeRate(12));
        let tx = draft.finalize().unwrap();
        assert_eq!(tx.amount, 50_000);
        assert_eq!(tx.fee, FeeMode::FeeRate(12));
        assert!(!tx.send_all);
    }

    #[test]
    fn test_fee_mode_kind() {
        assert_eq!(FeeMode::TargetBlocks(6).kind(), FeeModeKind::TargetBlocks);
        assert_eq!(FeeMode::FeeRate(2).kind(), FeeModeKind::FeeRate);
        assert!(!FeeMode::TargetBlocks(0).is_positive());
        assert!(FeeMode::FeeRate(1).is_positive());
    }
}
