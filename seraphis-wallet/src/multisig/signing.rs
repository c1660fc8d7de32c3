//! The multi-round multisig signing protocol over a partial transaction.
//!
//! A proposal's aggregate filter invites any number of signers from the
//! threshold up to the whole group; each threshold-sized subset of the
//! invitation is an independent signing attempt, and whichever attempt
//! collects a full complement of partials first yields the transaction.
//!
//! The proposal's signing message and per-input proof keys (the masked
//! addresses) are fixed before any signer participates, so nonces can be
//! derived deterministically per `(message, proof key, attempt)` context.
//! A [`NonceRecord`] refuses to initialize the same context twice; since
//! derivation is deterministic, a crashed-and-restarted signer reproduces
//! byte-identical partial signatures rather than leaking a nonce pair
//! across different messages.

use std::collections::{BTreeMap, HashSet};

use curve25519_dalek::edwards::EdwardsPoint;
use tracing::{debug, info};

use seraphis_crypto_core::composition::multisig::{
    aggregate_partial_signatures, make_partial_signature, verify_partial_signature,
    CompositionProofPartial, MultisigNoncePair, MultisigPubNonces,
};
use seraphis_crypto_core::generators::GEN_X;

use crate::builder::{PartialTx, Transaction};
use crate::error::{WalletError, WalletResult};
use crate::multisig::account::{
    filter_from_signers, lagrange_weight, signer_subsets, signers_in_filter, MultisigAccount,
    SignerSetFilter,
};

/// A partial transaction bound to an invited signer set, checked against
/// the account before any signing starts.
pub struct MultisigTxProposal {
    /// The unsigned transaction.
    pub partial: PartialTx,
    /// Every signer invited to participate; at least `threshold` bits.
    pub aggregate_filter: SignerSetFilter,
}

/// One signer's partial signatures for one signing attempt, one per input
/// in image order.
#[derive(Clone, Debug)]
pub struct MultisigPartialSet {
    /// The contributing signer.
    pub signer_index: u32,
    /// The threshold-sized attempt these partials belong to.
    pub filter: SignerSetFilter,
    /// Per-input partial composition proofs.
    pub partials: Vec<CompositionProofPartial>,
}

/// Tracks initialized signing contexts so a nonce context is never opened
/// twice.
#[derive(Default)]
pub struct NonceRecord {
    contexts: HashSet<([u8; 32], [u8; 32], SignerSetFilter)>,
}

impl NonceRecord {
    /// Empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signing context.
    ///
    /// # Errors
    /// `NonceReuse` if the context was already registered.
    pub fn try_init(
        &mut self,
        message: &[u8; 32],
        proof_key: &EdwardsPoint,
        filter: SignerSetFilter,
    ) -> WalletResult<()> {
        let key = (*message, proof_key.compress().to_bytes(), filter);
        if !self.contexts.insert(key) {
            return Err(WalletError::NonceReuse);
        }
        Ok(())
    }

    /// Whether a context is registered.
    #[must_use]
    pub fn contains(
        &self,
        message: &[u8; 32],
        proof_key: &EdwardsPoint,
        filter: SignerSetFilter,
    ) -> bool {
        self.contexts
            .contains(&(*message, proof_key.compress().to_bytes(), filter))
    }
}

impl MultisigTxProposal {
    /// Bind a partial transaction to a signing subset, checking that its
    /// witnesses actually open this account's spend key.
    ///
    /// # Errors
    /// `Multisig` when the filter is malformed or a witness does not
    /// reduce to the account's aggregate spend component; `TxInvalid` on
    /// an inconsistent key image.
    pub fn new(
        partial: PartialTx,
        aggregate_filter: SignerSetFilter,
        account: &MultisigAccount,
    ) -> WalletResult<Self> {
        account.check_filter(aggregate_filter)?;

        let spend_component = account.spend_component();
        for (image, witness) in partial.input_images.iter().zip(&partial.input_witnesses) {
            let residual = image.masked_address
                - EdwardsPoint::mul_base(&witness.witness_g)
                - witness.witness_x * *GEN_X;
            if residual != spend_component {
                return Err(WalletError::Multisig(
                    "input witness does not open the account spend key".into(),
                ));
            }
            let expected_image = witness.witness_x.invert() * spend_component;
            if image.compact_key_image.mul_by_cofactor() != expected_image {
                return Err(WalletError::TxInvalid(
                    "input image key image inconsistent with witness".into(),
                ));
            }
        }

        Ok(Self {
            partial,
            aggregate_filter,
        })
    }
}

impl MultisigAccount {
    /// Round 1: register the signing contexts for every attempt this
    /// signer belongs to and emit the public nonces, one per-input list
    /// per attempt.
    ///
    /// # Errors
    /// `Multisig` if this signer is not among the invited signers;
    /// `NonceReuse` if any context was already opened.
    pub fn init_signing(
        &self,
        record: &mut NonceRecord,
        proposal: &MultisigTxProposal,
    ) -> WalletResult<BTreeMap<SignerSetFilter, Vec<MultisigPubNonces>>> {
        let attempts = self.signing_attempts(proposal.aggregate_filter);
        if attempts.is_empty() {
            return Err(WalletError::Multisig(
                "signer is not part of the proposal's invited set".into(),
            ));
        }

        let message = &proposal.partial.message;
        let mut nonce_sets = BTreeMap::new();
        for attempt in attempts {
            let mut pub_nonces = Vec::with_capacity(proposal.partial.input_images.len());
            for image in &proposal.partial.input_images {
                record.try_init(message, &image.masked_address, attempt)?;
                let nonces = MultisigNoncePair::derive(
                    &self.nonce_seed,
                    message,
                    &image.masked_address,
                    attempt,
                );
                pub_nonces.push(nonces.pub_nonces());
            }
            nonce_sets.insert(attempt, pub_nonces);
        }
        debug!(
            signer = self.signer_index,
            attempts = nonce_sets.len(),
            inputs = proposal.partial.input_images.len(),
            "signing contexts initialized"
        );
        Ok(nonce_sets)
    }

    /// Round 2: produce one partial signature per input for one signing
    /// attempt, given every attempt signer's public nonces (keyed by
    /// signer index, each a per-input list).
    ///
    /// # Errors
    /// `Multisig` when the attempt is not a threshold-sized subset of the
    /// invitation containing this signer, or when the nonce map does not
    /// cover exactly the attempt; core signing errors propagate.
    pub fn make_partial_signatures(
        &self,
        proposal: &MultisigTxProposal,
        attempt: SignerSetFilter,
        nonce_sets: &BTreeMap<u32, Vec<MultisigPubNonces>>,
    ) -> WalletResult<MultisigPartialSet> {
        if attempt.count_ones() != self.threshold
            || attempt & !proposal.aggregate_filter != 0
            || attempt & (1 << self.signer_index) == 0
        {
            return Err(WalletError::Multisig(
                "attempt is not a threshold subset of the invitation with this signer".into(),
            ));
        }
        let subset = signers_in_filter(attempt);
        let num_inputs = proposal.partial.input_images.len();
        if nonce_sets.keys().copied().collect::<Vec<u32>>() != subset {
            return Err(WalletError::Multisig(
                "nonce sets do not match the signing attempt".into(),
            ));
        }
        if nonce_sets.values().any(|nonces| nonces.len() != num_inputs) {
            return Err(WalletError::Multisig(
                "nonce set length does not match input count".into(),
            ));
        }

        let message = &proposal.partial.message;
        let spend_component = self.spend_component();
        let lagrange = lagrange_weight(attempt, self.signer_index);

        let mut partials = Vec::with_capacity(num_inputs);
        for (index, (image, witness)) in proposal
            .partial
            .input_images
            .iter()
            .zip(&proposal.partial.input_witnesses)
            .enumerate()
        {
            let own_nonces = MultisigNoncePair::derive(
                &self.nonce_seed,
                message,
                &image.masked_address,
                attempt,
            );
            // Canonical order: ascending signer index.
            let all_pub_nonces: Vec<MultisigPubNonces> = subset
                .iter()
                .map(|signer| nonce_sets[signer][index])
                .collect();

            partials.push(make_partial_signature(
                message,
                &witness.witness_g,
                &witness.witness_x,
                &spend_component,
                &self.z_share,
                &lagrange,
                &own_nonces,
                &all_pub_nonces,
            )?);
        }

        Ok(MultisigPartialSet {
            signer_index: self.signer_index,
            filter: attempt,
            partials,
        })
    }

    /// Check another signer's partial set attributably.
    ///
    /// # Errors
    /// `BadPartialSignature` naming the signer when any per-input partial
    /// fails to open against its nonces and weighted key share.
    pub fn verify_partial_set(
        &self,
        set: &MultisigPartialSet,
        proposal: &MultisigTxProposal,
        nonce_sets: &BTreeMap<u32, Vec<MultisigPubNonces>>,
    ) -> WalletResult<()> {
        if set.filter.count_ones() != self.threshold
            || set.filter & !proposal.aggregate_filter != 0
        {
            return Err(WalletError::Multisig(
                "partial set's attempt is not a threshold subset of the invitation".into(),
            ));
        }
        let subset = signers_in_filter(set.filter);
        let Some(slot) = subset.iter().position(|s| *s == set.signer_index) else {
            return Err(WalletError::Multisig(
                "partial set from a signer outside its attempt".into(),
            ));
        };
        if set.partials.len() != proposal.partial.input_images.len() {
            return Err(WalletError::BadPartialSignature {
                signer: set.signer_index as usize,
            });
        }

        let weighted = self.weighted_share_pubkey(set.filter, set.signer_index);
        let signer_nonces = nonce_sets.get(&set.signer_index).ok_or_else(|| {
            WalletError::Multisig("missing nonce set for signer".into())
        })?;

        for (index, partial) in set.partials.iter().enumerate() {
            let all_pub_nonces: Vec<MultisigPubNonces> = subset
                .iter()
                .map(|signer| nonce_sets[signer][index])
                .collect();
            verify_partial_signature(
                partial,
                &signer_nonces[index],
                &all_pub_nonces,
                &weighted,
                slot,
            )
            .map_err(|_| WalletError::BadPartialSignature {
                signer: set.signer_index as usize,
            })?;
        }
        Ok(())
    }
}

/// Final round: find a signing attempt with a full complement of partials
/// and aggregate it into a complete transaction.
///
/// # Errors
/// `InsufficientPartialSigs` (listing the attempts still viable with the
/// signers that did deliver) when no threshold subset of the invitation
/// is fully covered; aggregation failures propagate as core errors.
pub fn assemble_transaction(
    proposal: MultisigTxProposal,
    threshold: u32,
    num_signers: u32,
    partial_sets: &[MultisigPartialSet],
) -> WalletResult<Transaction> {
    let num_inputs = proposal.partial.input_images.len();

    let mut by_context: BTreeMap<(SignerSetFilter, u32), &MultisigPartialSet> = BTreeMap::new();
    for set in partial_sets {
        if set.partials.len() == num_inputs {
            by_context.insert((set.filter, set.signer_index), set);
        }
    }

    let attempts: Vec<SignerSetFilter> = signer_subsets(threshold, num_signers)
        .into_iter()
        .filter(|attempt| attempt & !proposal.aggregate_filter == 0)
        .collect();
    let Some(complete) = attempts.iter().copied().find(|attempt| {
        signers_in_filter(*attempt)
            .iter()
            .all(|signer| by_context.contains_key(&(*attempt, *signer)))
    }) else {
        let delivered: Vec<u32> = by_context.keys().map(|(_, signer)| *signer).collect();
        let present = filter_from_signers(&delivered);
        let viable = attempts
            .into_iter()
            .filter(|attempt| attempt & !present == 0)
            .collect();
        return Err(WalletError::InsufficientPartialSigs { viable });
    };

    let subset = signers_in_filter(complete);
    let mut composition_proofs = Vec::with_capacity(num_inputs);
    for index in 0..num_inputs {
        let partials: Vec<CompositionProofPartial> = subset
            .iter()
            .map(|signer| by_context[&(complete, *signer)].partials[index].clone())
            .collect();
        composition_proofs.push(aggregate_partial_signatures(&partials)?);
    }

    info!(
        inputs = num_inputs,
        signers = subset.len(),
        "multisig transaction assembled"
    );

    let partial = proposal.partial;
    Ok(Transaction {
        input_images: partial.input_images,
        outputs: partial.outputs,
        balance_proof: partial.balance_proof,
        membership_proofs: partial.membership_proofs,
        composition_proofs,
        supplement: partial.supplement,
        fee: partial.fee,
    })
}
