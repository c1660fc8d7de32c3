//! Balance proofs: mask closure across an input/output set, plus the
//! per-commitment opening proofs standing at the range-proof seam.
//!
//! Inputs enter a transaction as pseudo-output commitments
//! `C̃_i = commit(a_i, x̃_i)`. Balance holds structurally when
//!
//! ```text
//! Σ C̃_in − Σ C_out − fee·H = 0
//! ```
//!
//! which the builder arranges by choosing pseudo blinding factors that sum
//! to the output blinding sum ([`make_pseudo_blinding_factors`]). Each
//! commitment additionally carries a Schnorr opening proof binding it to a
//! known 64-bit amount; an aggregate range-proof system slots in at the
//! same interface.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::{Identity, IsIdentity};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::generators::{commit, GEN_H};
use crate::hashing::hash_to_scalar;
use crate::keys::hierarchy::random_scalar;
use crate::types::errors::{CoreError, CoreResult};

/// Schnorr proof of knowledge of an opening `(a, x)` of `C = x·G + a·H`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrOpeningProof {
    /// Challenge.
    pub challenge: Scalar,
    /// Response on the blinding base `G`.
    pub response_blinding: Scalar,
    /// Response on the amount base `H`.
    pub response_amount: Scalar,
}

/// Per-commitment opening proofs for all pseudo-inputs and outputs of a
/// transaction, in that order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceProof {
    /// One proof per committed amount.
    pub opening_proofs: Vec<SchnorrOpeningProof>,
}

fn opening_challenge(
    message: &[u8; 32],
    commitment: &EdwardsPoint,
    nonce_point: &EdwardsPoint,
) -> Scalar {
    hash_to_scalar(
        b"sp_balance_proof_challenge",
        &[
            message,
            commitment.compress().as_bytes(),
            nonce_point.compress().as_bytes(),
        ],
    )
}

impl SchnorrOpeningProof {
    /// Prove knowledge of `(amount, blinding)` for its commitment.
    pub fn prove(
        message: &[u8; 32],
        amount: u64,
        blinding: &Scalar,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Self {
        let commitment = commit(amount, blinding);
        let nonce_blinding = random_scalar(rng);
        let nonce_amount = random_scalar(rng);
        let nonce_point =
            EdwardsPoint::mul_base(&nonce_blinding) + nonce_amount * *GEN_H;

        let e = opening_challenge(message, &commitment, &nonce_point);
        Self {
            challenge: e,
            response_blinding: nonce_blinding + e * blinding,
            response_amount: nonce_amount + e * Scalar::from(amount),
        }
    }

    /// Verify against a commitment.
    #[must_use]
    pub fn verify(&self, message: &[u8; 32], commitment: &EdwardsPoint) -> bool {
        let nonce_point = EdwardsPoint::mul_base(&self.response_blinding)
            + self.response_amount * *GEN_H
            - self.challenge * commitment;
        opening_challenge(message, commitment, &nonce_point) == self.challenge
    }
}

/// Pseudo blinding factors for `count` inputs summing to `target_sum`
/// (the sum of the output blinding factors). All but the last are random.
///
/// # Errors
/// `ProofCountMismatch` when `count` is zero.
pub fn make_pseudo_blinding_factors(
    target_sum: &Scalar,
    count: usize,
    rng: &mut (impl RngCore + CryptoRng),
) -> CoreResult<Vec<Scalar>> {
    if count == 0 {
        return Err(CoreError::ProofCountMismatch {
            expected: 1,
            actual: 0,
        });
    }
    let mut factors: Vec<Scalar> = (0..count - 1).map(|_| random_scalar(rng)).collect();
    let partial_sum = factors.iter().fold(Scalar::ZERO, |acc, f| acc + f);
    factors.push(target_sum - partial_sum);
    Ok(factors)
}

/// Structural balance check: `Σ C̃_in − Σ C_out − fee·H = 0`.
///
/// # Errors
/// `BalanceMismatch` when the sums do not cancel.
pub fn verify_balance_equality(
    pseudo_commitments: &[EdwardsPoint],
    output_commitments: &[EdwardsPoint],
    fee: u64,
) -> CoreResult<()> {
    let inputs = pseudo_commitments
        .iter()
        .fold(EdwardsPoint::identity(), |acc, c| acc + c);
    let outputs = output_commitments
        .iter()
        .fold(EdwardsPoint::identity(), |acc, c| acc + c);

    if (inputs - outputs - Scalar::from(fee) * *GEN_H).is_identity() {
        Ok(())
    } else {
        Err(CoreError::BalanceMismatch)
    }
}

impl BalanceProof {
    /// Prove openings for every `(amount, blinding)` pair, pseudo-inputs
    /// first, then outputs.
    pub fn prove(
        message: &[u8; 32],
        openings: &[(u64, Scalar)],
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Self {
        Self {
            opening_proofs: openings
                .iter()
                .map(|(amount, blinding)| {
                    SchnorrOpeningProof::prove(message, *amount, blinding, rng)
                })
                .collect(),
        }
    }

    /// Verify all openings against their commitments, in order.
    ///
    /// # Errors
    /// `ProofCountMismatch` on a count disagreement; `RangeProofInvalid`
    /// naming the first failing commitment.
    pub fn verify(&self, message: &[u8; 32], commitments: &[EdwardsPoint]) -> CoreResult<()> {
        if self.opening_proofs.len() != commitments.len() {
            return Err(CoreError::ProofCountMismatch {
                expected: commitments.len(),
                actual: self.opening_proofs.len(),
            });
        }
        for (index, (proof, commitment)) in
            self.opening_proofs.iter().zip(commitments).enumerate()
        {
            if !proof.verify(message, commitment) {
                return Err(CoreError::RangeProofInvalid {
                    output_index: index,
                });
            }
        }
        Ok(())
    }
}
