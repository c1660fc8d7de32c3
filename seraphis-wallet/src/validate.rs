//! Ordered transaction validation.
//!
//! Checks run cheapest-first so malformed or replayed transactions are
//! rejected before any proof work:
//!
//! 1. semantics: component counts, output ordering, ephemeral-pubkey rules
//! 2. key images: canonical encodings, no identity, no double spends
//! 3. structural balance: `Σ C̃ − Σ C_out − fee·H = 0`
//! 4. amount opening proofs (the range-proof seam)
//! 5. membership proofs, re-expanding each reference set from the ledger
//! 6. composition proofs against the recomputed prefix

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::traits::IsIdentity;
use tracing::debug;

use seraphis_crypto_core::verify_balance_equality;

use crate::builder::Transaction;
use crate::error::{WalletError, WalletResult};
use crate::ledger::Ledger;

fn check_semantics(tx: &Transaction) -> WalletResult<()> {
    let num_inputs = tx.input_images.len();
    if num_inputs == 0 {
        return Err(WalletError::TxInvalid("no inputs".into()));
    }
    if tx.membership_proofs.len() != num_inputs || tx.composition_proofs.len() != num_inputs {
        return Err(WalletError::TxInvalid(
            "per-input proof counts disagree".into(),
        ));
    }

    match tx.outputs.len() {
        0 | 1 => {
            return Err(WalletError::TxInvalid("fewer than two outputs".into()));
        }
        2 => {
            if tx.supplement.ephemeral_pubkeys.len() != 1 {
                return Err(WalletError::TxInvalid(
                    "two-output transaction must carry one shared ephemeral pubkey".into(),
                ));
            }
        }
        n => {
            if tx.supplement.ephemeral_pubkeys.len() != n {
                return Err(WalletError::TxInvalid(
                    "ephemeral pubkey count must match output count".into(),
                ));
            }
            for (i, a) in tx.supplement.ephemeral_pubkeys.iter().enumerate() {
                for b in &tx.supplement.ephemeral_pubkeys[i + 1..] {
                    if a == b {
                        return Err(WalletError::TxInvalid(
                            "duplicate ephemeral pubkey".into(),
                        ));
                    }
                }
            }
        }
    }

    // Outputs in canonical order, no duplicate one-time addresses.
    for pair in tx.outputs.windows(2) {
        let a = pair[0].onetime_address.compress();
        let b = pair[1].onetime_address.compress();
        if a.as_bytes() >= b.as_bytes() {
            return Err(WalletError::TxInvalid(
                "outputs not sorted by one-time address".into(),
            ));
        }
    }
    Ok(())
}

fn check_key_images(tx: &Transaction, ledger: &impl Ledger) -> WalletResult<()> {
    let mut previous: Option<[u8; 32]> = None;
    for image in &tx.input_images {
        let key_image = image.compact_key_image.mul_by_cofactor();
        if key_image.is_identity() {
            return Err(WalletError::TxInvalid("identity key image".into()));
        }
        let bytes = key_image.compress().to_bytes();
        if let Some(prev) = previous {
            if prev >= bytes {
                return Err(WalletError::TxInvalid(
                    "key images not sorted or duplicated".into(),
                ));
            }
        }
        previous = Some(bytes);
        if ledger.key_image_exists(&key_image) {
            return Err(WalletError::DoubleSpend);
        }
    }
    Ok(())
}

/// Validate a transaction against ledger state.
///
/// # Errors
/// `TxInvalid` for structural failures, `DoubleSpend` for replayed key
/// images; core proof errors propagate from the proof stages.
pub fn validate_transaction(tx: &Transaction, ledger: &impl Ledger) -> WalletResult<()> {
    check_semantics(tx)?;
    check_key_images(tx, ledger)?;

    let pseudo: Vec<EdwardsPoint> = tx
        .input_images
        .iter()
        .map(|image| image.masked_commitment)
        .collect();
    let outputs: Vec<EdwardsPoint> = tx
        .outputs
        .iter()
        .map(|enote| enote.amount_commitment)
        .collect();
    verify_balance_equality(&pseudo, &outputs, tx.fee.value())?;

    let message = tx.prefix();
    let commitments: Vec<EdwardsPoint> = pseudo.iter().chain(outputs.iter()).copied().collect();
    tx.balance_proof.verify(&message, &commitments)?;

    for (image, membership) in tx.input_images.iter().zip(&tx.membership_proofs) {
        let ring: Vec<(EdwardsPoint, EdwardsPoint)> = membership
            .ref_set
            .indices()
            .into_iter()
            .map(|index| {
                ledger.enote_at(index).ok_or_else(|| {
                    WalletError::TxInvalid(format!("reference index {index} beyond ledger"))
                })
            })
            .collect::<WalletResult<_>>()?;
        membership.proof.verify(
            &message,
            &ring,
            &image.masked_address,
            &image.masked_commitment,
        )?;
    }

    for (image, proof) in tx.input_images.iter().zip(&tx.composition_proofs) {
        let key_image = image.compact_key_image.mul_by_cofactor();
        proof.verify(&message, &image.masked_address, &key_image)?;
    }

    debug!(
        inputs = tx.input_images.len(),
        outputs = tx.outputs.len(),
        "transaction valid"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use seraphis_crypto_core::membership::binned::BinConfig;
    use seraphis_crypto_core::{
        make_destination, try_full_record, PaymentProposal, WalletKeys,
    };

    use crate::builder::{complete_transaction, make_partial_tx, TxInput, TxProposal};
    use crate::fee::DiscretizedFee;
    use crate::finalize::finalize_output_proposals;
    use crate::mock_ledger::MockLedger;

    const BIN_CONFIG: BinConfig = BinConfig {
        bin_radius: 2,
        num_bin_members: 2,
    };

    fn build_tx() -> (Transaction, MockLedger) {
        let keys = WalletKeys::generate(&mut OsRng);
        let dest = make_destination(&keys.view_balance.address_keys(), 0).unwrap();
        let ledger = MockLedger::new();

        let funding = PaymentProposal::new(dest.clone(), 100, &mut OsRng)
            .output_proposal()
            .unwrap();
        let mut block = vec![(funding.enote.clone(), funding.enote_ephemeral_pubkey)];
        for _ in 0..7 {
            let decoy = PaymentProposal::new(dest.clone(), 1, &mut OsRng)
                .output_proposal()
                .unwrap();
            block.push((decoy.enote, decoy.enote_ephemeral_pubkey));
        }
        ledger.add_coinbase_block(block);

        let record = try_full_record(
            &funding.enote,
            &funding.enote_ephemeral_pubkey,
            &keys.view_balance,
        )
        .unwrap();

        let other = WalletKeys::generate(&mut OsRng);
        let pay_dest = make_destination(&other.view_balance.address_keys(), 0).unwrap();
        let own_dest = make_destination(&keys.view_balance.address_keys(), 1).unwrap();
        let payment = PaymentProposal::new(pay_dest, 85, &mut OsRng)
            .output_proposal()
            .unwrap();
        let outputs = finalize_output_proposals(
            vec![payment],
            10,
            &own_dest,
            &keys.view_balance,
            &mut OsRng,
        )
        .unwrap();

        let proposal = TxProposal::new(
            vec![TxInput {
                record,
                ledger_index: 0,
            }],
            outputs,
            DiscretizedFee::from_fee_value(5),
            Vec::new(),
        )
        .unwrap();
        let partial = make_partial_tx(&proposal, &ledger, BIN_CONFIG, 4, &mut OsRng).unwrap();
        let tx = complete_transaction(partial, &keys, &mut OsRng).unwrap();
        (tx, ledger)
    }

    #[test]
    fn test_valid_transaction_passes() {
        let (tx, ledger) = build_tx();
        validate_transaction(&tx, &ledger).unwrap();
    }

    #[test]
    fn test_double_spend_rejected() {
        let (tx, ledger) = build_tx();
        ledger.submit_tx(&tx).unwrap();
        assert!(matches!(
            validate_transaction(&tx, &ledger),
            Err(WalletError::DoubleSpend)
        ));
    }

    #[test]
    fn test_fee_tamper_rejected() {
        let (mut tx, ledger) = build_tx();
        tx.fee = DiscretizedFee::from_fee_value(6);
        assert!(validate_transaction(&tx, &ledger).is_err());
    }

    #[test]
    fn test_memo_tamper_rejected() {
        let (mut tx, ledger) = build_tx();
        tx.supplement.memo = b"tampered".to_vec();
        // The prefix changes, so every proof bound to it fails.
        assert!(validate_transaction(&tx, &ledger).is_err());
    }

    #[test]
    fn test_output_reorder_rejected() {
        let (mut tx, ledger) = build_tx();
        tx.outputs.reverse();
        assert!(validate_transaction(&tx, &ledger).is_err());
    }

    #[test]
    fn test_proof_count_mismatch_rejected() {
        let (mut tx, ledger) = build_tx();
        tx.composition_proofs.pop();
        assert!(validate_transaction(&tx, &ledger).is_err());
    }
}
