//! Input selection with fee reconciliation.
//!
//! Selectors are pluggable: the builder asks for one more input at a time
//! until the selected total covers the payment total plus the fee for the
//! current transaction shape. Adding an input raises the fee, so the loop
//! re-evaluates until it stabilizes, funds run out, or the input cap is
//! hit.

use sha3::{Digest, Keccak256};
use tracing::debug;

use seraphis_crypto_core::FullRecord;

use crate::error::{WalletError, WalletResult};
use crate::fee::{DiscretizedFee, FeeConfig};

/// Default cap on inputs per transaction.
pub const MAX_INPUTS: usize = 16;

/// One-at-a-time input selection policy.
pub trait InputSelector {
    /// Propose the next input, given what is already selected and what
    /// has been excluded. `None` means the selector has nothing left.
    fn try_select_next(
        &self,
        desired_total: u64,
        selected: &[FullRecord],
        excluded: &[[u8; 32]],
    ) -> Option<FullRecord>;
}

fn is_taken(record: &FullRecord, selected: &[FullRecord], excluded: &[[u8; 32]]) -> bool {
    let key = record.key_image.compress().to_bytes();
    excluded.contains(&key)
        || selected
            .iter()
            .any(|r| r.key_image.compress().to_bytes() == key)
}

/// Largest-amount-first selector.
pub struct TrivialSelector {
    candidates: Vec<FullRecord>,
}

impl TrivialSelector {
    /// Selector over the given spendable records.
    #[must_use]
    pub fn new(mut candidates: Vec<FullRecord>) -> Self {
        candidates.sort_by(|a, b| b.amount.cmp(&a.amount));
        Self { candidates }
    }
}

impl InputSelector for TrivialSelector {
    fn try_select_next(
        &self,
        _desired_total: u64,
        selected: &[FullRecord],
        excluded: &[[u8; 32]],
    ) -> Option<FullRecord> {
        self.candidates
            .iter()
            .find(|record| !is_taken(record, selected, excluded))
            .cloned()
    }
}

/// Deterministic pseudo-random selector: candidate order is keyed by a
/// seed so repeated builds pick differently-shaped input sets.
pub struct PseudoRandomSelector {
    candidates: Vec<FullRecord>,
}

impl PseudoRandomSelector {
    /// Selector over the given spendable records, ordered by a seed.
    #[must_use]
    pub fn new(mut candidates: Vec<FullRecord>, seed: [u8; 32]) -> Self {
        candidates.sort_by_key(|record| {
            let mut hasher = Keccak256::new();
            hasher.update(b"input_selection_order");
            hasher.update(seed);
            hasher.update(record.key_image.compress().as_bytes());
            let digest: [u8; 32] = hasher.finalize().into();
            digest
        });
        Self { candidates }
    }
}

impl InputSelector for PseudoRandomSelector {
    fn try_select_next(
        &self,
        _desired_total: u64,
        selected: &[FullRecord],
        excluded: &[[u8; 32]],
    ) -> Option<FullRecord> {
        self.candidates
            .iter()
            .find(|record| !is_taken(record, selected, excluded))
            .cloned()
    }
}

/// Select inputs to cover `output_total` plus the (shape-dependent) fee.
///
/// `num_outputs` should count the payments plus the change/dummy output
/// the finalizer will add. Returns the selected records and the
/// reconciled fee.
///
/// # Errors
/// `InsufficientFunds` when the selector runs dry below the target;
/// `TooManyInputs` past the cap.
pub fn select_inputs(
    selector: &dyn InputSelector,
    output_total: u64,
    num_outputs: usize,
    fee_config: &FeeConfig,
    max_inputs: usize,
) -> WalletResult<(Vec<FullRecord>, DiscretizedFee)> {
    let mut selected: Vec<FullRecord> = Vec::new();
    let excluded: Vec<[u8; 32]> = Vec::new();

    loop {
        let fee = fee_config.fee_for(selected.len().max(1), num_outputs);
        let desired = output_total.saturating_add(fee.value());
        let have: u64 = selected.iter().map(|r| r.amount).sum();

        if have >= desired && !selected.is_empty() {
            // Re-check with the true shape now that the count is final.
            let final_fee = fee_config.fee_for(selected.len(), num_outputs);
            if have >= output_total.saturating_add(final_fee.value()) {
                debug!(
                    inputs = selected.len(),
                    total = have,
                    fee = final_fee.value(),
                    "input selection complete"
                );
                return Ok((selected, final_fee));
            }
        }

        if selected.len() >= max_inputs {
            return Err(WalletError::TooManyInputs {
                count: selected.len() + 1,
                max: max_inputs,
            });
        }
        match selector.try_select_next(desired, &selected, &excluded) {
            Some(record) => selected.push(record),
            None => {
                return Err(WalletError::InsufficientFunds {
                    needed: desired,
                    available: have,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use seraphis_crypto_core::{make_destination, try_full_record, PaymentProposal, WalletKeys};

    fn records(keys: &WalletKeys, amounts: &[u64]) -> Vec<FullRecord> {
        let dest = make_destination(&keys.view_balance.address_keys(), 0).unwrap();
        amounts
            .iter()
            .map(|amount| {
                let output = PaymentProposal::new(dest.clone(), *amount, &mut OsRng)
                    .output_proposal()
                    .unwrap();
                try_full_record(
                    &output.enote,
                    &output.enote_ephemeral_pubkey,
                    &keys.view_balance,
                )
                .unwrap()
            })
            .collect()
    }

    fn zero_fee() -> FeeConfig {
        FeeConfig {
            fee_per_weight: 0,
            ..FeeConfig::default()
        }
    }

    #[test]
    fn test_trivial_selector_prefers_largest() {
        let keys = WalletKeys::generate(&mut OsRng);
        let selector = TrivialSelector::new(records(&keys, &[5, 100, 20]));
        let (selected, fee) = select_inputs(&selector, 90, 2, &zero_fee(), MAX_INPUTS).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].amount, 100);
        assert_eq!(fee.value(), 0);
    }

    #[test]
    fn test_selection_covers_fee() {
        let keys = WalletKeys::generate(&mut OsRng);
        let selector = TrivialSelector::new(records(&keys, &[150, 150]));
        let config = FeeConfig::default(); // base 50 + 30/in + 20/out
        let (selected, fee) = select_inputs(&selector, 80, 2, &config, MAX_INPUTS).unwrap();
        let total: u64 = selected.iter().map(|r| r.amount).sum();
        assert!(total >= 80 + fee.value());
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_insufficient_funds_reported() {
        let keys = WalletKeys::generate(&mut OsRng);
        let selector = TrivialSelector::new(records(&keys, &[5, 5]));
        let err = select_inputs(&selector, 100, 2, &zero_fee(), MAX_INPUTS).unwrap_err();
        assert!(matches!(
            err,
            WalletError::InsufficientFunds {
                needed: 100,
                available: 10
            }
        ));
    }

    #[test]
    fn test_input_cap_enforced() {
        let keys = WalletKeys::generate(&mut OsRng);
        let selector = TrivialSelector::new(records(&keys, &[1, 1, 1, 1]));
        let err = select_inputs(&selector, 4, 2, &zero_fee(), 2).unwrap_err();
        assert!(matches!(err, WalletError::TooManyInputs { max: 2, .. }));
    }

    #[test]
    fn test_pseudo_random_selection_is_seed_stable() {
        let keys = WalletKeys::generate(&mut OsRng);
        let pool = records(&keys, &[1, 2, 3, 4, 5, 6]);
        let a = PseudoRandomSelector::new(pool.clone(), [7u8; 32]);
        let b = PseudoRandomSelector::new(pool, [7u8; 32]);
        let (sel_a, _) = select_inputs(&a, 6, 2, &zero_fee(), MAX_INPUTS).unwrap();
        let (sel_b, _) = select_inputs(&b, 6, 2, &zero_fee(), MAX_INPUTS).unwrap();
        let keys_a: Vec<_> = sel_a.iter().map(|r| r.key_image.compress()).collect();
        let keys_b: Vec<_> = sel_b.iter().map(|r| r.key_image.compress()).collect();
        assert_eq!(keys_a, keys_b);
    }
}
