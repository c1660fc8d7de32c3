//! Ring membership proofs.
//!
//! For a reference ring of enotes `(Ko_i, C_i)` and an input image with
//! masked address `K̃o` and masked commitment `C̃`, the proof shows that
//! for some hidden index `l`:
//!
//! ```text
//! K̃o − Ko_l = t_k·G        (address mask)
//! C̃  − C_l  = t_c·G        (commitment mask delta)
//! ```
//!
//! The two relations are folded into one with an aggregation coefficient
//! `μ` and proven with an AOS-style ring signature over
//! `P_i + μ·Q_i` where `P_i = K̃o − Ko_i`, `Q_i = C̃ − C_i`:
//!
//! ```text
//! c_{i+1} = H_n("challenge" ‖ m* ‖ r_i·G + c_i·(P_i + μ·Q_i))
//! ```
//!
//! with `m*` binding the message, the image keys, and every ring member.
//! The proof is `(c_0, r_0, …, r_{n−1})`.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use zeroize::Zeroize;

use crate::hashing::hash_to_scalar;
use crate::keys::hierarchy::random_scalar;
use crate::types::errors::{CoreError, CoreResult};

/// An AOS ring signature over a reference ring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipProof {
    /// Challenge at ring position 0.
    pub initial_challenge: Scalar,
    /// One response per ring member.
    pub responses: Vec<Scalar>,
}

/// Bind message, image keys, and the full ring into the challenge input.
fn ring_digest(
    message: &[u8; 32],
    ring: &[(EdwardsPoint, EdwardsPoint)],
    masked_address: &EdwardsPoint,
    masked_commitment: &EdwardsPoint,
) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(b"sp_membership_proof_message");
    hasher.update(message);
    hasher.update(masked_address.compress().as_bytes());
    hasher.update(masked_commitment.compress().as_bytes());
    for (onetime_address, commitment) in ring {
        hasher.update(onetime_address.compress().as_bytes());
        hasher.update(commitment.compress().as_bytes());
    }
    hasher.finalize().into()
}

fn aggregation_coefficient(bound_message: &[u8; 32]) -> Scalar {
    hash_to_scalar(b"sp_membership_proof_aggregation", &[bound_message])
}

fn chain_challenge(bound_message: &[u8; 32], commitment_point: &EdwardsPoint) -> Scalar {
    hash_to_scalar(
        b"sp_membership_proof_challenge",
        &[bound_message, commitment_point.compress().as_bytes()],
    )
}

/// The folded statement keys `P_i + μ·Q_i`.
fn folded_keys(
    ring: &[(EdwardsPoint, EdwardsPoint)],
    masked_address: &EdwardsPoint,
    masked_commitment: &EdwardsPoint,
    mu: &Scalar,
) -> Vec<EdwardsPoint> {
    ring.iter()
        .map(|(onetime_address, commitment)| {
            (masked_address - onetime_address) + mu * (masked_commitment - commitment)
        })
        .collect()
}

impl MembershipProof {
    /// Prove that `(masked_address, masked_commitment)` re-blinds ring
    /// member `real_index` with masks `(address_mask, commitment_mask)`.
    ///
    /// # Errors
    /// `MembershipProofInvalid` if the index is out of range or the masks
    /// do not open the claimed ring member.
    #[allow(clippy::too_many_arguments)]
    pub fn prove(
        message: &[u8; 32],
        ring: &[(EdwardsPoint, EdwardsPoint)],
        real_index: usize,
        masked_address: &EdwardsPoint,
        masked_commitment: &EdwardsPoint,
        address_mask: &Scalar,
        commitment_mask: &Scalar,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> CoreResult<Self> {
        let n = ring.len();
        if n == 0 || real_index >= n {
            return Err(CoreError::MembershipProofInvalid);
        }

        let (real_address, real_commitment) = &ring[real_index];
        if masked_address - real_address != EdwardsPoint::mul_base(address_mask)
            || masked_commitment - real_commitment != EdwardsPoint::mul_base(commitment_mask)
        {
            return Err(CoreError::MembershipProofInvalid);
        }

        let bound = ring_digest(message, ring, masked_address, masked_commitment);
        let mu = aggregation_coefficient(&bound);
        let keys = folded_keys(ring, masked_address, masked_commitment, &mu);
        let mut witness = address_mask + mu * commitment_mask;

        let mut responses = vec![Scalar::ZERO; n];
        let mut challenges = vec![Scalar::ZERO; n];

        // Start at the real index with a fresh nonce, walk the ring, and
        // close the loop with the witness.
        let mut alpha = random_scalar(rng);
        challenges[(real_index + 1) % n] =
            chain_challenge(&bound, &EdwardsPoint::mul_base(&alpha));

        let mut i = (real_index + 1) % n;
        while i != real_index {
            responses[i] = random_scalar(rng);
            let commitment_point =
                EdwardsPoint::mul_base(&responses[i]) + challenges[i] * keys[i];
            challenges[(i + 1) % n] = chain_challenge(&bound, &commitment_point);
            i = (i + 1) % n;
        }

        responses[real_index] = alpha - challenges[real_index] * witness;
        alpha.zeroize();
        witness.zeroize();

        Ok(Self {
            initial_challenge: challenges[0],
            responses,
        })
    }

    /// Verify against the ring and image keys.
    ///
    /// # Errors
    /// `MembershipProofInvalid` if the challenge chain does not close.
    pub fn verify(
        &self,
        message: &[u8; 32],
        ring: &[(EdwardsPoint, EdwardsPoint)],
        masked_address: &EdwardsPoint,
        masked_commitment: &EdwardsPoint,
    ) -> CoreResult<()> {
        let n = ring.len();
        if n == 0 || self.responses.len() != n {
            return Err(CoreError::MembershipProofInvalid);
        }

        let bound = ring_digest(message, ring, masked_address, masked_commitment);
        let mu = aggregation_coefficient(&bound);
        let keys = folded_keys(ring, masked_address, masked_commitment, &mu);

        let mut challenge = self.initial_challenge;
        for i in 0..n {
            let commitment_point =
                EdwardsPoint::mul_base(&self.responses[i]) + challenge * keys[i];
            challenge = chain_challenge(&bound, &commitment_point);
        }

        if challenge == self.initial_challenge {
            Ok(())
        } else {
            Err(CoreError::MembershipProofInvalid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::commit;
    use rand::rngs::OsRng;

    fn random_ring(n: usize) -> Vec<(EdwardsPoint, EdwardsPoint)> {
        (0..n)
            .map(|_| {
                (
                    EdwardsPoint::mul_base(&random_scalar(&mut OsRng)),
                    commit(100, &random_scalar(&mut OsRng)),
                )
            })
            .collect()
    }

    fn masked(
        ring: &[(EdwardsPoint, EdwardsPoint)],
        l: usize,
    ) -> (EdwardsPoint, EdwardsPoint, Scalar, Scalar) {
        let t_k = random_scalar(&mut OsRng);
        let t_c = random_scalar(&mut OsRng);
        (
            ring[l].0 + EdwardsPoint::mul_base(&t_k),
            ring[l].1 + EdwardsPoint::mul_base(&t_c),
            t_k,
            t_c,
        )
    }

    #[test]
    fn test_prove_verify_round_trip() {
        let ring = random_ring(8);
        let message = [1u8; 32];
        for l in [0usize, 3, 7] {
            let (ka, kc, t_k, t_c) = masked(&ring, l);
            let proof =
                MembershipProof::prove(&message, &ring, l, &ka, &kc, &t_k, &t_c, &mut OsRng)
                    .unwrap();
            proof.verify(&message, &ring, &ka, &kc).unwrap();
        }
    }

    #[test]
    fn test_wrong_masks_rejected_at_prove_time() {
        let ring = random_ring(4);
        let (ka, kc, t_k, _) = masked(&ring, 1);
        let wrong = random_scalar(&mut OsRng);
        assert!(MembershipProof::prove(
            &[0u8; 32],
            &ring,
            1,
            &ka,
            &kc,
            &t_k,
            &wrong,
            &mut OsRng
        )
        .is_err());
    }

    #[test]
    fn test_tampered_ring_rejected() {
        let ring = random_ring(4);
        let message = [2u8; 32];
        let (ka, kc, t_k, t_c) = masked(&ring, 2);
        let proof =
            MembershipProof::prove(&message, &ring, 2, &ka, &kc, &t_k, &t_c, &mut OsRng).unwrap();

        let mut tampered = ring.clone();
        tampered[0].0 = EdwardsPoint::mul_base(&random_scalar(&mut OsRng));
        assert_eq!(
            proof.verify(&message, &tampered, &ka, &kc),
            Err(CoreError::MembershipProofInvalid)
        );
        assert_eq!(
            proof.verify(&[9u8; 32], &ring, &ka, &kc),
            Err(CoreError::MembershipProofInvalid)
        );
    }

    #[test]
    fn test_response_count_must_match_ring() {
        let ring = random_ring(4);
        let message = [4u8; 32];
        let (ka, kc, t_k, t_c) = masked(&ring, 0);
        let mut proof =
            MembershipProof::prove(&message, &ring, 0, &ka, &kc, &t_k, &t_c, &mut OsRng).unwrap();
        proof.responses.pop();
        assert!(proof.verify(&message, &ring, &ka, &kc).is_err());
    }
}
