//! 2-of-3 multisig: key exchange, funding the shared address, and spends
//! by different signer pairs over one proposal.

use std::collections::BTreeMap;

use rand::rngs::OsRng;

use seraphis_crypto_core::membership::binned::BinConfig;
use seraphis_crypto_core::{make_destination, PaymentProposal, WalletKeys};
use seraphis_wallet::multisig::{
    assemble_transaction, filter_from_signers, run_key_exchange, MultisigAccount,
    MultisigPartialSet, MultisigTxProposal, NonceRecord, SignerSetFilter,
};
use seraphis_wallet::{
    finalize_output_proposals, make_partial_tx, refresh, validate_transaction, DiscretizedFee,
    EnoteStore, MockLedger, PartialTx, ScanConfig, Transaction, TxInput, TxProposal,
    WalletError,
};

const BIN_CONFIG: BinConfig = BinConfig {
    bin_radius: 1,
    num_bin_members: 2,
};

struct SharedWallet {
    accounts: Vec<MultisigAccount>,
    ledger: MockLedger,
    partial: PartialTx,
}

/// Form the account, fund it with 100, and build an unsigned spend of 90
/// to an outside wallet with 10 change.
fn setup() -> SharedWallet {
    let accounts = run_key_exchange(2, 3, &mut OsRng).unwrap();
    let shared_dest =
        make_destination(&accounts[0].view_balance.address_keys(), 0).unwrap();

    let ledger = MockLedger::new();
    let funding = PaymentProposal::new(shared_dest.clone(), 100, &mut OsRng)
        .output_proposal()
        .unwrap();
    let outside = WalletKeys::generate(&mut OsRng);
    let outside_dest = make_destination(&outside.view_balance.address_keys(), 0).unwrap();
    let mut block = vec![(funding.enote.clone(), funding.enote_ephemeral_pubkey)];
    for _ in 0..3 {
        let decoy = PaymentProposal::new(outside_dest.clone(), 1, &mut OsRng)
            .output_proposal()
            .unwrap();
        block.push((decoy.enote, decoy.enote_ephemeral_pubkey));
    }
    ledger.add_coinbase_block(block);

    // Any signer scans with the shared view-balance keys.
    let mut store = EnoteStore::new(0);
    refresh(
        &ledger,
        &accounts[1].view_balance,
        &mut store,
        &ScanConfig::default(),
    )
    .unwrap();
    assert_eq!(store.onchain_balance(), 100);

    let record = store.spendable_records().remove(0);
    let ledger_index = store
        .get(&record.key_image.compress().to_bytes())
        .unwrap()
        .origin
        .ledger_index;

    let payment = PaymentProposal::new(outside_dest, 90, &mut OsRng)
        .output_proposal()
        .unwrap();
    let change_dest =
        make_destination(&accounts[0].view_balance.address_keys(), 1).unwrap();
    let outputs = finalize_output_proposals(
        vec![payment],
        10,
        &change_dest,
        &accounts[0].view_balance,
        &mut OsRng,
    )
    .unwrap();

    let proposal = TxProposal::new(
        vec![TxInput {
            record,
            ledger_index,
        }],
        outputs,
        DiscretizedFee::ZERO,
        Vec::new(),
    )
    .unwrap();
    let partial = make_partial_tx(&proposal, &ledger, BIN_CONFIG, 4, &mut OsRng).unwrap();

    SharedWallet {
        accounts,
        ledger,
        partial,
    }
}

/// Run the signing rounds for one pair of signers.
fn sign_with(
    shared: &SharedWallet,
    signers: &[u32],
) -> (Transaction, SignerSetFilter) {
    let filter = filter_from_signers(signers);
    let accounts = &shared.accounts;

    let mut nonce_sets = BTreeMap::new();
    for signer in signers {
        let proposal = MultisigTxProposal::new(
            shared.partial.clone(),
            filter,
            &accounts[*signer as usize],
        )
        .unwrap();
        let mut record = NonceRecord::new();
        let nonces = accounts[*signer as usize]
            .init_signing(&mut record, &proposal)
            .unwrap()
            .remove(&filter)
            .unwrap();
        nonce_sets.insert(*signer, nonces);
    }

    let mut partial_sets: Vec<MultisigPartialSet> = Vec::new();
    for signer in signers {
        let proposal = MultisigTxProposal::new(
            shared.partial.clone(),
            filter,
            &accounts[*signer as usize],
        )
        .unwrap();
        partial_sets.push(
            accounts[*signer as usize]
                .make_partial_signatures(&proposal, filter, &nonce_sets)
                .unwrap(),
        );
    }

    // Cross-verify before assembling.
    let verifier_proposal =
        MultisigTxProposal::new(shared.partial.clone(), filter, &accounts[signers[0] as usize])
            .unwrap();
    for set in &partial_sets {
        accounts[signers[0] as usize]
            .verify_partial_set(set, &verifier_proposal, &nonce_sets)
            .unwrap();
    }

    let tx = assemble_transaction(verifier_proposal, 2, 3, &partial_sets).unwrap();
    (tx, filter)
}

#[test]
fn test_any_pair_can_spend() {
    let shared = setup();

    let (tx_01, _) = sign_with(&shared, &[0, 1]);
    validate_transaction(&tx_01, &shared.ledger).unwrap();

    let (tx_02, _) = sign_with(&shared, &[0, 2]);
    validate_transaction(&tx_02, &shared.ledger).unwrap();

    let (tx_12, _) = sign_with(&shared, &[1, 2]);
    validate_transaction(&tx_12, &shared.ledger).unwrap();
}

#[test]
fn test_full_group_invitation_completed_by_one_pair() {
    let shared = setup();
    let accounts = &shared.accounts;
    let everyone = filter_from_signers(&[0, 1, 2]);

    // Inviting the whole group gives every signer one attempt per pair it
    // belongs to.
    let mut attempt_nonces = Vec::new();
    for signer in 0..3u32 {
        let proposal = MultisigTxProposal::new(
            shared.partial.clone(),
            everyone,
            &accounts[signer as usize],
        )
        .unwrap();
        let mut record = NonceRecord::new();
        let nonces = accounts[signer as usize]
            .init_signing(&mut record, &proposal)
            .unwrap();
        assert_eq!(nonces.len(), 2);
        attempt_nonces.push(nonces);
    }

    // Only the {0, 2} attempt goes on to round 2.
    let pair = filter_from_signers(&[0, 2]);
    let mut nonce_sets = BTreeMap::new();
    nonce_sets.insert(0u32, attempt_nonces[0][&pair].clone());
    nonce_sets.insert(2u32, attempt_nonces[2][&pair].clone());

    let mut partial_sets: Vec<MultisigPartialSet> = Vec::new();
    for signer in [0u32, 2] {
        let proposal = MultisigTxProposal::new(
            shared.partial.clone(),
            everyone,
            &accounts[signer as usize],
        )
        .unwrap();
        partial_sets.push(
            accounts[signer as usize]
                .make_partial_signatures(&proposal, pair, &nonce_sets)
                .unwrap(),
        );
    }

    let proposal =
        MultisigTxProposal::new(shared.partial.clone(), everyone, &accounts[0]).unwrap();
    for set in &partial_sets {
        accounts[0]
            .verify_partial_set(set, &proposal, &nonce_sets)
            .unwrap();
    }

    let tx = assemble_transaction(proposal, 2, 3, &partial_sets).unwrap();
    validate_transaction(&tx, &shared.ledger).unwrap();
}

#[test]
fn test_mismatched_attempts_report_the_viable_one() {
    let shared = setup();
    let accounts = &shared.accounts;
    let everyone = filter_from_signers(&[0, 1, 2]);

    let mut attempt_nonces = Vec::new();
    for signer in 0..3u32 {
        let proposal = MultisigTxProposal::new(
            shared.partial.clone(),
            everyone,
            &accounts[signer as usize],
        )
        .unwrap();
        let mut record = NonceRecord::new();
        attempt_nonces.push(
            accounts[signer as usize]
                .init_signing(&mut record, &proposal)
                .unwrap(),
        );
    }

    // Signer 0 signs for the {0, 1} attempt, signer 2 for {0, 2}; neither
    // attempt is complete, but {0, 2} is still viable with the signers
    // that delivered.
    let pair_01 = filter_from_signers(&[0, 1]);
    let mut nonces_01 = BTreeMap::new();
    nonces_01.insert(0u32, attempt_nonces[0][&pair_01].clone());
    nonces_01.insert(1u32, attempt_nonces[1][&pair_01].clone());

    let pair_02 = filter_from_signers(&[0, 2]);
    let mut nonces_02 = BTreeMap::new();
    nonces_02.insert(0u32, attempt_nonces[0][&pair_02].clone());
    nonces_02.insert(2u32, attempt_nonces[2][&pair_02].clone());

    let proposal_0 =
        MultisigTxProposal::new(shared.partial.clone(), everyone, &accounts[0]).unwrap();
    let proposal_2 =
        MultisigTxProposal::new(shared.partial.clone(), everyone, &accounts[2]).unwrap();
    let partial_sets = vec![
        accounts[0]
            .make_partial_signatures(&proposal_0, pair_01, &nonces_01)
            .unwrap(),
        accounts[2]
            .make_partial_signatures(&proposal_2, pair_02, &nonces_02)
            .unwrap(),
    ];

    let err = assemble_transaction(proposal_0, 2, 3, &partial_sets).unwrap_err();
    match err {
        WalletError::InsufficientPartialSigs { viable } => assert_eq!(viable, vec![pair_02]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_same_pair_reproduces_identical_proofs() {
    let shared = setup();

    // Deterministic nonces: a re-run of the same (prefix, filter) context
    // yields byte-identical final proofs.
    let (first, _) = sign_with(&shared, &[1, 2]);
    let (second, _) = sign_with(&shared, &[1, 2]);
    assert_eq!(first.composition_proofs, second.composition_proofs);

    // A different pair signs validly but produces different bytes.
    let (other, _) = sign_with(&shared, &[0, 1]);
    assert_ne!(first.composition_proofs, other.composition_proofs);
}

#[test]
fn test_nonce_context_cannot_be_reopened() {
    let shared = setup();
    let filter = filter_from_signers(&[0, 1]);
    let proposal =
        MultisigTxProposal::new(shared.partial.clone(), filter, &shared.accounts[0]).unwrap();

    let mut record = NonceRecord::new();
    shared.accounts[0]
        .init_signing(&mut record, &proposal)
        .unwrap();
    assert!(matches!(
        shared.accounts[0].init_signing(&mut record, &proposal),
        Err(WalletError::NonceReuse)
    ));
}

#[test]
fn test_missing_signer_reports_viable_subsets() {
    let shared = setup();
    let filter = filter_from_signers(&[0, 1]);
    let accounts = &shared.accounts;

    let mut nonce_sets = BTreeMap::new();
    for signer in [0u32, 1] {
        let proposal =
            MultisigTxProposal::new(shared.partial.clone(), filter, &accounts[signer as usize])
                .unwrap();
        let mut record = NonceRecord::new();
        nonce_sets.insert(
            signer,
            accounts[signer as usize]
                .init_signing(&mut record, &proposal)
                .unwrap()
                .remove(&filter)
                .unwrap(),
        );
    }
    let proposal = MultisigTxProposal::new(shared.partial.clone(), filter, &accounts[0]).unwrap();
    let only_zero = vec![accounts[0]
        .make_partial_signatures(&proposal, filter, &nonce_sets)
        .unwrap()];

    let err = assemble_transaction(proposal, 2, 3, &only_zero).unwrap_err();
    match err {
        WalletError::InsufficientPartialSigs { viable } => assert!(viable.is_empty()),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_bad_partial_is_attributed() {
    let shared = setup();
    let filter = filter_from_signers(&[1, 2]);
    let accounts = &shared.accounts;

    let mut nonce_sets = BTreeMap::new();
    for signer in [1u32, 2] {
        let proposal =
            MultisigTxProposal::new(shared.partial.clone(), filter, &accounts[signer as usize])
                .unwrap();
        let mut record = NonceRecord::new();
        nonce_sets.insert(
            signer,
            accounts[signer as usize]
                .init_signing(&mut record, &proposal)
                .unwrap()
                .remove(&filter)
                .unwrap(),
        );
    }

    let proposal = MultisigTxProposal::new(shared.partial.clone(), filter, &accounts[1]).unwrap();
    let mut corrupt = accounts[2]
        .make_partial_signatures(&proposal, filter, &nonce_sets)
        .unwrap();
    corrupt.partials[0].partial_response_u += curve25519_dalek::scalar::Scalar::ONE;

    assert!(matches!(
        accounts[1].verify_partial_set(&corrupt, &proposal, &nonce_sets),
        Err(WalletError::BadPartialSignature { signer: 2 })
    ));
}
