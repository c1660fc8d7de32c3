//! Output-set finalization.
//!
//! Takes the caller's payments plus a change amount and adds the change,
//! dummy, or self-send output required to satisfy the output invariants:
//! at least one self-send per transaction, exactly-two outputs share one
//! ephemeral pubkey, three or more have pairwise-distinct ones, and no
//! two self-sends of one type may share an ephemeral pubkey.
//!
//! The decision table is driven by three observables of the incoming set:
//! output count, ephemeral-pubkey uniqueness, and self-send presence.
//! "Special" additions reuse the single existing output's ephemeral
//! pubkey; "normal" additions carry their own.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use tracing::debug;

use seraphis_crypto_core::cipher::AddressTag;
use seraphis_crypto_core::keys::hierarchy::{random_scalar, ViewBalanceKeys};
use seraphis_crypto_core::{
    commit, CoreError, Destination, Enote, OutputProposal, SelfSendProposal, SelfSendType,
};

use crate::error::{WalletError, WalletResult};

/// A zero-amount filler output addressed to nobody. Its commitment opens
/// to zero with a known blinding factor, so balance and range proofs
/// treat it like any other output; no wallet will ever claim it.
fn make_dummy_output(
    ephemeral_pubkey: EdwardsPoint,
    is_special: bool,
    rng: &mut (impl RngCore + CryptoRng),
) -> OutputProposal {
    let amount_blinding = random_scalar(rng);
    let mut view_tag = [0u8; 1];
    rng.fill_bytes(&mut view_tag);
    let mut encrypted_amount = [0u8; 8];
    rng.fill_bytes(&mut encrypted_amount);
    let mut tag_bytes = [0u8; 16];
    rng.fill_bytes(&mut tag_bytes);

    OutputProposal {
        enote: Enote {
            onetime_address: EdwardsPoint::mul_base(&random_scalar(rng)),
            amount_commitment: commit(0, &amount_blinding),
            view_tag: view_tag[0],
            encrypted_amount,
            encrypted_address_tag: AddressTag(tag_bytes),
        },
        enote_ephemeral_pubkey: ephemeral_pubkey,
        amount: 0,
        amount_blinding,
        self_send_type: None,
        is_special,
    }
}

fn has_self_send(outputs: &[OutputProposal]) -> bool {
    outputs.iter().any(|o| o.self_send_type.is_some())
}

fn unique_ephemeral_pubkeys(outputs: &[OutputProposal]) -> bool {
    for (i, a) in outputs.iter().enumerate() {
        for b in &outputs[i + 1..] {
            if a.enote_ephemeral_pubkey == b.enote_ephemeral_pubkey {
                return false;
            }
        }
    }
    true
}

fn same_type_self_send_pair(outputs: &[OutputProposal]) -> bool {
    for (i, a) in outputs.iter().enumerate() {
        for b in &outputs[i + 1..] {
            if a.self_send_type.is_some() && a.self_send_type == b.self_send_type {
                return true;
            }
        }
    }
    false
}

/// Reject any two self-sends of one type sharing an ephemeral pubkey
/// (they would derive identical one-time addresses).
fn check_self_send_collisions(outputs: &[OutputProposal]) -> WalletResult<()> {
    for (i, a) in outputs.iter().enumerate() {
        for b in &outputs[i + 1..] {
            if a.self_send_type.is_some()
                && a.self_send_type == b.self_send_type
                && a.enote_ephemeral_pubkey == b.enote_ephemeral_pubkey
            {
                return Err(WalletError::Core(CoreError::SelfSendTypeCollision));
            }
        }
    }
    Ok(())
}

/// Finalize an output set: add the change/dummy output the rules demand,
/// then sort by one-time address and reject duplicates.
///
/// # Errors
/// `OutputSet` for every unsatisfiable row of the decision table;
/// `SelfSendTypeCollision` if the result would contain two same-type
/// self-sends sharing an ephemeral pubkey.
pub fn finalize_output_proposals(
    mut outputs: Vec<OutputProposal>,
    change_amount: u64,
    change_destination: &Destination,
    view_balance: &ViewBalanceKeys,
    rng: &mut (impl RngCore + CryptoRng),
) -> WalletResult<Vec<OutputProposal>> {
    let count = outputs.len();
    let unique = unique_ephemeral_pubkeys(&outputs);
    let self_send = has_self_send(&outputs);

    match (count, change_amount, unique) {
        (0, _, _) => {
            return Err(WalletError::OutputSet(
                "at least one payment is required".into(),
            ));
        }
        (1, 0, _) => {
            let shared = outputs[0].enote_ephemeral_pubkey;
            if self_send {
                // A plain dummy suffices; the self-send is already there.
                outputs.push(make_dummy_output(shared, true, rng));
            } else {
                outputs.push(
                    SelfSendProposal::special(
                        change_destination.clone(),
                        0,
                        SelfSendType::Dummy,
                        shared,
                    )
                    .output_proposal(view_balance)?,
                );
            }
        }
        (1, _, _) => {
            if outputs[0].self_send_type == Some(SelfSendType::Change) {
                return Err(WalletError::OutputSet(
                    "cannot add change next to an existing change output".into(),
                ));
            }
            let shared = outputs[0].enote_ephemeral_pubkey;
            outputs.push(
                SelfSendProposal::special(
                    change_destination.clone(),
                    change_amount,
                    SelfSendType::Change,
                    shared,
                )
                .output_proposal(view_balance)?,
            );
        }
        (2, 0, true) => {
            if self_send {
                outputs.push(make_dummy_output(
                    EdwardsPoint::mul_base(&random_scalar(rng)),
                    false,
                    rng,
                ));
            } else {
                outputs.push(
                    SelfSendProposal::normal(
                        change_destination.clone(),
                        0,
                        SelfSendType::Dummy,
                        rng,
                    )
                    .output_proposal(view_balance)?,
                );
            }
        }
        (2, 0, false) => {
            if same_type_self_send_pair(&outputs) {
                return Err(WalletError::Core(CoreError::SelfSendTypeCollision));
            }
            if !self_send {
                return Err(WalletError::OutputSet(
                    "two outputs share an ephemeral pubkey and neither is a self-send".into(),
                ));
            }
            // Exactly two outputs sharing one ephemeral pubkey with a
            // self-send among them: already final.
        }
        (2, _, false) => {
            return Err(WalletError::OutputSet(
                "cannot add change: two outputs already share an ephemeral pubkey".into(),
            ));
        }
        (2, _, true) | (_, 1.., _) => {
            outputs.push(
                SelfSendProposal::normal(
                    change_destination.clone(),
                    change_amount,
                    SelfSendType::Change,
                    rng,
                )
                .output_proposal(view_balance)?,
            );
        }
        (_, 0, _) => {
            if !self_send {
                outputs.push(
                    SelfSendProposal::normal(
                        change_destination.clone(),
                        0,
                        SelfSendType::Dummy,
                        rng,
                    )
                    .output_proposal(view_balance)?,
                );
            }
        }
    }

    check_self_send_collisions(&outputs)?;
    check_output_set(&outputs)?;

    outputs.sort_by(|a, b| {
        a.enote
            .onetime_address
            .compress()
            .as_bytes()
            .cmp(b.enote.onetime_address.compress().as_bytes())
    });
    for pair in outputs.windows(2) {
        if pair[0].enote.onetime_address == pair[1].enote.onetime_address {
            return Err(WalletError::OutputSet(
                "duplicate one-time address in output set".into(),
            ));
        }
    }

    debug!(outputs = outputs.len(), "output set finalized");
    Ok(outputs)
}

/// Structural output-set rules, checked after finalization and again
/// during validation: 2 outputs share one ephemeral pubkey, 3+ carry
/// pairwise-distinct ones.
pub fn check_output_set(outputs: &[OutputProposal]) -> WalletResult<()> {
    match outputs.len() {
        0 | 1 => Err(WalletError::OutputSet(
            "a transaction needs at least two outputs".into(),
        )),
        2 => {
            if outputs[0].enote_ephemeral_pubkey != outputs[1].enote_ephemeral_pubkey {
                return Err(WalletError::OutputSet(
                    "a two-output set must share one ephemeral pubkey".into(),
                ));
            }
            Ok(())
        }
        _ => {
            if !unique_ephemeral_pubkeys(outputs) {
                return Err(WalletError::OutputSet(
                    "three or more outputs must have distinct ephemeral pubkeys".into(),
                ));
            }
            Ok(())
        }
    }
}
