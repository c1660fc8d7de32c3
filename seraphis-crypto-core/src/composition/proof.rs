//! Single-signer composition proofs.
//!
//! Statement, for proof key `K` and key image `KI`:
//!
//! ```text
//! K  = x·G + y·X + z·U
//! y·KI − z·U = 0          (equivalently KI = (z/y)·U)
//! ```
//!
//! Schnorr-style with nonces `(a, b, c)`:
//!
//! ```text
//! A₁ = a·G + b·X + c·U
//! A₂ = b·KI − c·U
//! e  = H_n("sp_composition_proof_challenge" ‖ m ‖ K ‖ KI ‖ A₁ ‖ A₂)
//! r₁ = a + e·x,  r₂ = b + e·y,  r₃ = c + e·z
//! ```
//!
//! The proof is `(e, r₁, r₂, r₃)`; verification reconstructs both nonce
//! points from the responses and recomputes the challenge.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::generators::{GEN_U, GEN_X};
use crate::hashing::hash_to_scalar;
use crate::keys::hierarchy::random_scalar;
use crate::types::errors::{CoreError, CoreResult};

/// A composition proof `(e, r₁, r₂, r₃)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionProof {
    /// Challenge `e`.
    pub challenge: Scalar,
    /// `G`-side response `r₁`.
    pub response_g: Scalar,
    /// `X`-side response `r₂`.
    pub response_x: Scalar,
    /// `U`-side response `r₃`.
    pub response_u: Scalar,
}

pub(crate) fn challenge(
    message: &[u8; 32],
    proof_key: &EdwardsPoint,
    key_image: &EdwardsPoint,
    nonce_point_1: &EdwardsPoint,
    nonce_point_2: &EdwardsPoint,
) -> Scalar {
    hash_to_scalar(
        b"sp_composition_proof_challenge",
        &[
            message,
            proof_key.compress().as_bytes(),
            key_image.compress().as_bytes(),
            nonce_point_1.compress().as_bytes(),
            nonce_point_2.compress().as_bytes(),
        ],
    )
}

/// Reconstruct `(K, KI)` from the witness. Shared with the multisig path,
/// which holds `(x, y)` but only `z·U`.
pub(crate) fn proof_keys_from_witness(
    x: &Scalar,
    y: &Scalar,
    z_pubkey: &EdwardsPoint,
) -> CoreResult<(EdwardsPoint, EdwardsPoint)> {
    if *y == Scalar::ZERO {
        return Err(CoreError::CompositionProofFailed(
            "X-component witness is zero".into(),
        ));
    }
    let proof_key = EdwardsPoint::mul_base(x) + y * *GEN_X + z_pubkey;
    let key_image = y.invert() * z_pubkey;
    Ok((proof_key, key_image))
}

impl CompositionProof {
    /// Prove knowledge of `(x, y, z)` for `K = xG + yX + zU`, binding the
    /// proof to `message`.
    ///
    /// # Errors
    /// `CompositionProofFailed` if `y` or `z` is zero (either makes the
    /// linking-tag relation degenerate).
    pub fn prove(
        message: &[u8; 32],
        x: &Scalar,
        y: &Scalar,
        z: &Scalar,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> CoreResult<Self> {
        if *z == Scalar::ZERO {
            return Err(CoreError::CompositionProofFailed(
                "U-component witness is zero".into(),
            ));
        }
        let z_pubkey = z * *GEN_U;
        let (proof_key, key_image) = proof_keys_from_witness(x, y, &z_pubkey)?;

        let mut a = random_scalar(rng);
        let mut b = random_scalar(rng);
        let mut c = random_scalar(rng);

        let nonce_point_1 = EdwardsPoint::mul_base(&a) + b * *GEN_X + c * *GEN_U;
        let nonce_point_2 = b * key_image - c * *GEN_U;

        let e = challenge(message, &proof_key, &key_image, &nonce_point_1, &nonce_point_2);

        let proof = Self {
            challenge: e,
            response_g: a + e * x,
            response_x: b + e * y,
            response_u: c + e * z,
        };
        a.zeroize();
        b.zeroize();
        c.zeroize();
        Ok(proof)
    }

    /// Verify against a proof key and its claimed key image.
    ///
    /// # Errors
    /// `CompositionProofInvalid` if the recomputed challenge differs.
    pub fn verify(
        &self,
        message: &[u8; 32],
        proof_key: &EdwardsPoint,
        key_image: &EdwardsPoint,
    ) -> CoreResult<()> {
        let nonce_point_1 = EdwardsPoint::mul_base(&self.response_g)
            + self.response_x * *GEN_X
            + self.response_u * *GEN_U
            - self.challenge * proof_key;
        let nonce_point_2 = self.response_x * key_image - self.response_u * *GEN_U;

        let e = challenge(message, proof_key, key_image, &nonce_point_1, &nonce_point_2);
        if e == self.challenge {
            Ok(())
        } else {
            Err(CoreError::CompositionProofInvalid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn witness() -> (Scalar, Scalar, Scalar) {
        (
            random_scalar(&mut OsRng),
            random_scalar(&mut OsRng),
            random_scalar(&mut OsRng),
        )
    }

    #[test]
    fn test_prove_verify_round_trip() {
        let (x, y, z) = witness();
        let message = [7u8; 32];
        let proof = CompositionProof::prove(&message, &x, &y, &z, &mut OsRng).unwrap();

        let proof_key = EdwardsPoint::mul_base(&x) + y * *GEN_X + z * *GEN_U;
        let key_image = (y.invert() * z) * *GEN_U;
        proof.verify(&message, &proof_key, &key_image).unwrap();
    }

    #[test]
    fn test_wrong_message_rejected() {
        let (x, y, z) = witness();
        let proof = CompositionProof::prove(&[1u8; 32], &x, &y, &z, &mut OsRng).unwrap();
        let proof_key = EdwardsPoint::mul_base(&x) + y * *GEN_X + z * *GEN_U;
        let key_image = (y.invert() * z) * *GEN_U;
        assert_eq!(
            proof.verify(&[2u8; 32], &proof_key, &key_image),
            Err(CoreError::CompositionProofInvalid)
        );
    }

    #[test]
    fn test_wrong_key_image_rejected() {
        let (x, y, z) = witness();
        let message = [9u8; 32];
        let proof = CompositionProof::prove(&message, &x, &y, &z, &mut OsRng).unwrap();
        let proof_key = EdwardsPoint::mul_base(&x) + y * *GEN_X + z * *GEN_U;
        let bogus_image = Scalar::from(2u64) * *GEN_U;
        assert_eq!(
            proof.verify(&message, &proof_key, &bogus_image),
            Err(CoreError::CompositionProofInvalid)
        );
    }

    #[test]
    fn test_degenerate_witness_rejected() {
        let (x, y, _) = witness();
        assert!(CompositionProof::prove(&[0u8; 32], &x, &y, &Scalar::ZERO, &mut OsRng).is_err());
        assert!(CompositionProof::prove(&[0u8; 32], &x, &Scalar::ZERO, &y, &mut OsRng).is_err());
    }
}
