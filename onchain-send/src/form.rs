//! Form State
//!
//! Owns the transaction draft until it is handed to the dispatch boundary,
//! together with the inputs that shape it: the selected display unit, the fee
//! mode selector and the sweep settings.

use crate::draft::{FeeMode, FeeModeKind, TransactionDraft};
use crate::units::CurrencyUnit;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    draft: TransactionDraft,
    fee_kind: FeeModeKind,
    unit: CurrencyUnit,
    sweep_all: bool,
    /// Sweepable balance in base units, supplied from outside
    sweep_balance: u64,
}

impl FormState {
    /// An empty form for a regular send
    pub fn new() -> Self {
        Self::default()
    }

    /// A form in sweep mode, pre-filled with the sweepable balance
    pub fn sweep(balance: u64) -> Self {
        let mut form = Self::default();
        form.set_sweep_all(true);
        form.set_sweep_balance(balance);
        form
    }

    pub fn draft(&self) -> &TransactionDraft {
        &self.draft
    }

    pub fn unit(&self) -> CurrencyUnit {
        self.unit
    }

    pub fn fee_kind(&self) -> FeeModeKind {
        self.fee_kind
    }

    pub fn sweep_all(&self) -> bool {
        self.sweep_all
    }

    pub fn sweep_balance(&self) -> u64 {
        self.sweep_balance
    }

    pub fn set_address(&mut self, address: impl Into<String>) {
        self.draft.address = address.into();
    }

    /// Set the amount, expressed in the currently selected unit
    pub fn set_amount(&mut self, amount: f64) {
        self.draft.amount = amount;
    }

    /// Select the display unit without converting the amount.
    ///
    /// Use [`crate::workflow::SendWorkflow::change_unit`] to switch units
    /// while keeping the amount's value.
    pub fn set_unit(&mut self, unit: CurrencyUnit) {
        self.unit = unit;
    }

    /// Switch the fee mode selector. The value of the other mode is cleared.
    pub fn select_fee_kind(&mut self, kind: FeeModeKind) {
        self.fee_kind = kind;
        if self.draft.fee.map(|fee| fee.kind()) != Some(kind) {
            self.draft.fee = None;
        }
    }

    pub fn set_target_blocks(&mut self, blocks: u32) {
        self.fee_kind = FeeModeKind::TargetBlocks;
        self.draft.fee = Some(FeeMode::TargetBlocks(blocks));
    }

    pub fn set_fee_rate(&mut self, rate: u64) {
        self.fee_kind = FeeModeKind::FeeRate;
        self.draft.fee = Some(FeeMode::FeeRate(rate));
    }

    /// Enter or leave sweep mode. Entering pre-fills the amount with the
    /// known sweep balance.
    pub fn set_sweep_all(&mut self, sweep_all: bool) {
        self.sweep_all = sweep_all;
        if sweep_all {
            self.prefill_sweep_amount();
        }
    }

    /// Record the sweepable balance. In sweep mode this overwrites the
    /// draft amount; the amount never flows back into the balance.
    pub fn set_sweep_balance(&mut self, balance: u64) {
        self.sweep_balance = balance;
        if self.sweep_all {
            self.prefill_sweep_amount();
        }
    }

    // The balance is in base units
    fn prefill_sweep_amount(&mut self) {
        self.draft.amount = self.sweep_balance as f64;
        self.unit = CurrencyUnit::Sats;
    }

    /// Whether the draft is complete enough to submit
    pub fn validate(&self) -> bool {
        if self.draft.address.trim().is_empty() {
            return false;
        }
        if !(self.draft.amount.is_finite() && self.draft.amount > 0.0) {
            return false;
        }
        match self.draft.fee {
            Some(fee) => fee.kind() == self.fee_kind && fee.is_positive(),
            None => false,
        }
    }

    /// Clear the form for a new entry.
    ///
    /// In sweep mode only the address and fee are cleared so the sweep
    /// amount survives.
    pub fn reset(&mut self) {
        self.fee_kind = FeeModeKind::default();
        if self.sweep_all {
            self.draft.address.clear();
            self.draft.fee = None;
        } else {
            self.draft = TransactionDraft::default();
        }
    }

    pub(crate) fn draft_mut(&mut self) -> &mut TransactionDraft {
        &mut self.draft
    }

    /// Replace the amount with its base-unit value and select the base unit
    pub(crate) fn normalize_amount(&mut self, base_amount: f64) {
        self.draft.amount = base_amount;
        self.unit = CurrencyUnit::Sats;
    }

    /// Drop the draft once it has been handed off
    pub(crate) fn clear_draft(&mut self) {
        self.draft = TransactionDraft::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_form() -> FormState {
        let mut form = FormState::new();
        form.set_address("bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh");
        form.set_amount(50_000.0);
        form.set_target_blocks(6);
        form
    }

    #[test]
    fn test_validate_complete_form() {
        assert!(complete_form().validate());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let mut form = complete_form();
        form.set_address("  ");
        assert!(!form.validate());

        let mut form = complete_form();
        form.set_amount(0.0);
        assert!(!form.validate());

        let mut form = complete_form();
        form.set_amount(-1.0);
        assert!(!form.validate());

        let mut form = complete_form();
        form.set_target_blocks(0);
        assert!(!form.validate());
    }

    #[test]
    fn test_validate_requires_value_for_selected_mode() {
        let mut form = complete_form();
        form.select_fee_kind(FeeModeKind::FeeRate);
        assert!(!form.validate());

        form.set_fee_rate(20);
        assert!(form.validate());
    }

    #[test]
    fn test_switching_mode_clears_other_value() {
        let mut form = complete_form();
        form.select_fee_kind(FeeModeKind::FeeRate);
        assert_eq!(form.draft().fee, None);

        form.set_fee_rate(3);
        form.select_fee_kind(FeeModeKind::FeeRate);
        assert_eq!(form.draft().fee, Some(FeeMode::FeeRate(3)));
    }

    #[test]
    fn test_sweep_balance_overwrites_amount() {
        let mut form = FormState::sweep(120_000);
        assert_eq!(form.draft().amount, 120_000.0);

        form.set_unit(CurrencyUnit::Btc);
        form.set_sweep_balance(90_000);
        assert_eq!(form.draft().amount, 90_000.0);
        assert_eq!(form.unit(), CurrencyUnit::Sats);
    }

    #[test]
    fn test_sweep_balance_ignored_outside_sweep_mode() {
        let mut form = complete_form();
        form.set_sweep_balance(1);
        assert_eq!(form.draft().amount, 50_000.0);
        assert_eq!(form.sweep_balance(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut form = complete_form();
        form.set_fee_rate(5);
        form.reset();
        assert!(form.draft().is_empty());
        assert_eq!(form.fee_kind(), FeeModeKind::TargetBlocks);

        // Idempotent
        form.reset();
        assert!(form.draft().is_empty());
    }

    #[test]
    fn test_reset_in_sweep_mode_keeps_amount() {
        let mut form = FormState::sweep(120_000);
        form.set_address("bc1qsweep");
        form.set_fee_rate(8);
        form.reset();

        assert_eq!(form.draft().address, "");
        assert_eq!(form.draft().fee, None);
        assert_eq!(form.draft().amount, 120_000.0);
        assert!(form.sweep_all());
    }

    #[test]
    fn test_normalize_selects_base_unit() {
        let mut form = complete_form();
        form.set_unit(CurrencyUnit::Btc);
        form.normalize_amount(12_345.0);
        assert_eq!(form.unit(), CurrencyUnit::Sats);
        assert_eq!(form.draft().amount, 12_345.0);
    }
}
