//! Transaction assembly.
//!
//! A transaction is built in three stages:
//!
//! 1. [`TxProposal`]: finalized outputs plus chosen inputs and a fee,
//!    checked for exact balance. Its prefix hash is computable before any
//!    masking happens, so it doubles as the signing message.
//! 2. [`make_partial_tx`]: inputs are masked into enote images, reference
//!    sets are sampled from the ledger, and membership plus balance proofs
//!    are produced. The result still lacks spend authority.
//! 3. [`complete_transaction`]: the master spend key signs one composition
//!    proof per input. In the multisig path this stage is replaced by
//!    partial-signature aggregation over the same [`PartialTx`].

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use seraphis_crypto_core::generators::INV_EIGHT;
use seraphis_crypto_core::keys::hierarchy::random_scalar;
use seraphis_crypto_core::membership::binned::{BinConfig, BinnedReferenceSet};
use seraphis_crypto_core::{
    commit, make_pseudo_blinding_factors, BalanceProof, CompositionProof, Enote, EnoteImage,
    FullRecord, MembershipProof, OutputProposal, WalletKeys,
};

use crate::error::{WalletError, WalletResult};
use crate::fee::DiscretizedFee;
use crate::finalize::check_output_set;
use crate::ledger::Ledger;
use crate::version::make_version_string;

/// One input to spend: the owned-enote record and its flat ledger index
/// (needed to place the real member inside a reference set).
#[derive(Clone, Debug)]
pub struct TxInput {
    /// Full owned-enote record.
    pub record: FullRecord,
    /// Flat index of the enote on the ledger.
    pub ledger_index: u64,
}

/// A balanced transaction intent: inputs, finalized outputs, fee, memo.
#[derive(Clone, Debug)]
pub struct TxProposal {
    /// Inputs, sorted by key image.
    pub inputs: Vec<TxInput>,
    /// Finalized outputs, sorted by one-time address.
    pub outputs: Vec<OutputProposal>,
    /// Discretized fee.
    pub fee: DiscretizedFee,
    /// Optional memo carried in the supplement.
    pub memo: Vec<u8>,
}

/// Per-input membership material carried by a transaction: the compact
/// reference-set encoding and the ring proof over its expansion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MembershipProofData {
    /// Compact reference set.
    pub ref_set: BinnedReferenceSet,
    /// Ring membership proof.
    pub proof: MembershipProof,
}

/// Non-proof transaction extras: ephemeral pubkeys and the memo.
///
/// A two-output transaction carries a single shared ephemeral pubkey;
/// larger sets carry one per output, in output order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxSupplement {
    /// Deduplicated ephemeral pubkeys.
    pub ephemeral_pubkeys: Vec<EdwardsPoint>,
    /// Memo bytes.
    pub memo: Vec<u8>,
}

/// Secret per-input signing witness `(x, y)` of the masked address
/// `K̃o = x·G + y·X + z·U`. The `z` component is the master spend key and
/// is supplied at completion time.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct InputWitness {
    /// `G`-component: address mask plus enote view extension.
    pub witness_g: Scalar,
    /// `X`-component: enote view privkey.
    pub witness_x: Scalar,
}

/// A transaction with everything but spend authority: images, outputs,
/// membership and balance proofs, plus the per-input signing witnesses.
#[derive(Clone)]
pub struct PartialTx {
    /// Input images, in proposal (key-image) order.
    pub input_images: Vec<EnoteImage>,
    /// Output enotes, sorted by one-time address.
    pub outputs: Vec<Enote>,
    /// Opening proofs for pseudo-input and output commitments.
    pub balance_proof: BalanceProof,
    /// Per-input membership material.
    pub membership_proofs: Vec<MembershipProofData>,
    /// Ephemeral pubkeys and memo.
    pub supplement: TxSupplement,
    /// Discretized fee.
    pub fee: DiscretizedFee,
    /// The signing message (proposal prefix).
    pub message: [u8; 32],
    /// Secret signing witnesses, parallel to `input_images`.
    pub input_witnesses: Vec<InputWitness>,
}

/// A complete transaction ready for submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// Input images.
    pub input_images: Vec<EnoteImage>,
    /// Output enotes.
    pub outputs: Vec<Enote>,
    /// Balance proof.
    pub balance_proof: BalanceProof,
    /// Per-input membership proofs.
    pub membership_proofs: Vec<MembershipProofData>,
    /// Per-input composition proofs.
    pub composition_proofs: Vec<CompositionProof>,
    /// Supplement.
    pub supplement: TxSupplement,
    /// Discretized fee.
    pub fee: DiscretizedFee,
}

// =============================================================================
// Prefix hashing
// =============================================================================

/// The signing message: a digest over everything the transaction commits
/// to except masks and proofs, so it is computable before masking and
/// recomputable by validators.
fn tx_prefix(
    key_images: &[EdwardsPoint],
    outputs: &[Enote],
    ephemeral_pubkey_of: impl Fn(usize) -> EdwardsPoint,
    memo: &[u8],
    fee: DiscretizedFee,
) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(b"sp_tx_proposal_prefix");
    hasher.update(make_version_string().as_bytes());
    hasher.update(fee.value().to_le_bytes());
    hasher.update((key_images.len() as u64).to_le_bytes());
    for key_image in key_images {
        hasher.update(key_image.compress().as_bytes());
    }
    hasher.update((outputs.len() as u64).to_le_bytes());
    for (index, enote) in outputs.iter().enumerate() {
        hasher.update(enote.onetime_address.compress().as_bytes());
        hasher.update(enote.amount_commitment.compress().as_bytes());
        hasher.update([enote.view_tag]);
        hasher.update(enote.encrypted_amount);
        hasher.update(enote.encrypted_address_tag.0);
        hasher.update(ephemeral_pubkey_of(index).compress().as_bytes());
    }
    hasher.update((memo.len() as u64).to_le_bytes());
    hasher.update(memo);
    hasher.finalize().into()
}

fn key_image_bytes(record: &FullRecord) -> [u8; 32] {
    record.key_image.compress().to_bytes()
}

impl TxProposal {
    /// Assemble and check a proposal. Inputs are sorted by key image and
    /// must balance the outputs plus the fee exactly; the output set must
    /// already be finalized.
    ///
    /// # Errors
    /// `TxInvalid` on an empty input set, a duplicate input, or an amount
    /// imbalance; `OutputSet` on a malformed output set.
    pub fn new(
        mut inputs: Vec<TxInput>,
        outputs: Vec<OutputProposal>,
        fee: DiscretizedFee,
        memo: Vec<u8>,
    ) -> WalletResult<Self> {
        if inputs.is_empty() {
            return Err(WalletError::TxInvalid("no inputs".into()));
        }
        check_output_set(&outputs)?;

        inputs.sort_by_key(|input| key_image_bytes(&input.record));
        for pair in inputs.windows(2) {
            if key_image_bytes(&pair[0].record) == key_image_bytes(&pair[1].record) {
                return Err(WalletError::TxInvalid("duplicate input".into()));
            }
        }

        let input_total: u64 = inputs.iter().map(|input| input.record.amount).sum();
        let output_total: u64 = outputs.iter().map(|output| output.amount).sum();
        let needed = output_total
            .checked_add(fee.value())
            .ok_or_else(|| WalletError::TxInvalid("output total overflow".into()))?;
        if input_total != needed {
            return Err(WalletError::TxInvalid(format!(
                "inputs {input_total} do not balance outputs {output_total} plus fee {}",
                fee.value()
            )));
        }

        Ok(Self {
            inputs,
            outputs,
            fee,
            memo,
        })
    }

    /// The signing message for this proposal.
    #[must_use]
    pub fn proposal_prefix(&self) -> [u8; 32] {
        let key_images: Vec<EdwardsPoint> = self
            .inputs
            .iter()
            .map(|input| input.record.key_image)
            .collect();
        let enotes: Vec<Enote> = self
            .outputs
            .iter()
            .map(|output| output.enote.clone())
            .collect();
        tx_prefix(
            &key_images,
            &enotes,
            |index| self.outputs[index].enote_ephemeral_pubkey,
            &self.memo,
            self.fee,
        )
    }
}

// =============================================================================
// Partial transactions
// =============================================================================

/// Mask the inputs and produce every proof except spend authority.
///
/// # Errors
/// Core proof errors propagate; `TxInvalid` when a sampled reference index
/// has no enote on the ledger.
pub fn make_partial_tx(
    proposal: &TxProposal,
    ledger: &impl Ledger,
    bin_config: BinConfig,
    ref_set_size: u64,
    rng: &mut (impl RngCore + CryptoRng),
) -> WalletResult<PartialTx> {
    let message = proposal.proposal_prefix();
    let num_inputs = proposal.inputs.len();

    // Pseudo-output masks close against the output blinding sum.
    let target_sum = proposal
        .outputs
        .iter()
        .fold(Scalar::ZERO, |acc, output| acc + output.amount_blinding);
    let pseudo_blindings = make_pseudo_blinding_factors(&target_sum, num_inputs, rng)?;

    let mut input_images = Vec::with_capacity(num_inputs);
    let mut membership_proofs = Vec::with_capacity(num_inputs);
    let mut input_witnesses = Vec::with_capacity(num_inputs);

    for (input, pseudo_blinding) in proposal.inputs.iter().zip(&pseudo_blindings) {
        let record = &input.record;
        let address_mask = random_scalar(rng);
        let masked_address =
            EdwardsPoint::mul_base(&address_mask) + record.enote.onetime_address;
        let masked_commitment = commit(record.amount, pseudo_blinding);
        let commitment_mask = pseudo_blinding - record.amount_blinding;

        let (ref_set, real_position) = BinnedReferenceSet::new(
            bin_config,
            input.ledger_index,
            ledger.num_enotes(),
            ref_set_size,
            rng,
        )?;
        let ring: Vec<(EdwardsPoint, EdwardsPoint)> = ref_set
            .indices()
            .into_iter()
            .map(|index| {
                ledger.enote_at(index).ok_or_else(|| {
                    WalletError::TxInvalid(format!("reference index {index} beyond ledger"))
                })
            })
            .collect::<WalletResult<_>>()?;

        let proof = MembershipProof::prove(
            &message,
            &ring,
            real_position,
            &masked_address,
            &masked_commitment,
            &address_mask,
            &commitment_mask,
            rng,
        )?;

        input_images.push(EnoteImage {
            masked_address,
            masked_commitment,
            compact_key_image: *INV_EIGHT * record.key_image,
        });
        membership_proofs.push(MembershipProofData { ref_set, proof });
        input_witnesses.push(InputWitness {
            witness_g: address_mask + record.enote_view_extension_g,
            witness_x: record.enote_view_privkey,
        });
    }

    // Openings: pseudo-inputs first, then outputs.
    let openings: Vec<(u64, Scalar)> = proposal
        .inputs
        .iter()
        .zip(&pseudo_blindings)
        .map(|(input, blinding)| (input.record.amount, *blinding))
        .chain(
            proposal
                .outputs
                .iter()
                .map(|output| (output.amount, output.amount_blinding)),
        )
        .collect();
    let balance_proof = BalanceProof::prove(&message, &openings, rng);

    let ephemeral_pubkeys = if proposal.outputs.len() == 2 {
        vec![proposal.outputs[0].enote_ephemeral_pubkey]
    } else {
        proposal
            .outputs
            .iter()
            .map(|output| output.enote_ephemeral_pubkey)
            .collect()
    };

    debug!(
        inputs = num_inputs,
        outputs = proposal.outputs.len(),
        fee = proposal.fee.value(),
        "partial transaction assembled"
    );

    Ok(PartialTx {
        input_images,
        outputs: proposal
            .outputs
            .iter()
            .map(|output| output.enote.clone())
            .collect(),
        balance_proof,
        membership_proofs,
        supplement: TxSupplement {
            ephemeral_pubkeys,
            memo: proposal.memo.clone(),
        },
        fee: proposal.fee,
        message,
        input_witnesses,
    })
}

/// Sign a partial transaction with the master spend key.
///
/// # Errors
/// Composition-proof errors propagate (degenerate witnesses).
pub fn complete_transaction(
    partial: PartialTx,
    keys: &WalletKeys,
    rng: &mut (impl RngCore + CryptoRng),
) -> WalletResult<Transaction> {
    let mut composition_proofs = Vec::with_capacity(partial.input_witnesses.len());
    for witness in &partial.input_witnesses {
        composition_proofs.push(CompositionProof::prove(
            &partial.message,
            &witness.witness_g,
            &witness.witness_x,
            &keys.k_m,
            rng,
        )?);
    }

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

impl Transaction {
    /// Ephemeral pubkey for the output at `index`, resolving the shared
    /// two-output encoding.
    #[must_use]
    pub fn ephemeral_pubkey_for_output(&self, index: usize) -> EdwardsPoint {
        if self.supplement.ephemeral_pubkeys.len() == 1 {
            self.supplement.ephemeral_pubkeys[0]
        } else {
            self.supplement.ephemeral_pubkeys[index]
        }
    }

    /// Key images of all inputs, recovered from their compact encodings.
    pub fn key_images(&self) -> impl Iterator<Item = EdwardsPoint> + '_ {
        self.input_images
            .iter()
            .map(|image| image.compact_key_image.mul_by_cofactor())
    }

    /// Recompute the signing message this transaction's proofs are bound
    /// to.
    #[must_use]
    pub fn prefix(&self) -> [u8; 32] {
        let key_images: Vec<EdwardsPoint> = self.key_images().collect();
        tx_prefix(
            &key_images,
            &self.outputs,
            |index| self.ephemeral_pubkey_for_output(index),
            &self.supplement.memo,
            self.fee,
        )
    }
}
