//! Threshold-multisig composition proofs.
//!
//! Only the `U`-side witness `z` is shared among signers; `x` (mask plus
//! address/sender extensions on `G`) and `y` (the enote view privkey) are
//! common knowledge within the signer group because they derive from the
//! shared view-balance key. The proof is therefore split only on `r₃`:
//!
//! - each signer holds a Shamir share `z_i` of `z` and contributes
//!   `r₃ᵢ = (α_i1 + ρ·α_i2) + e·λ_i·z_i` with dual nonces on `U`
//! - the nonce aggregate `Σ(D_i1 + ρ·D_i2)` plays the role of `c·U`
//! - the common nonces `(a, b)` are derived deterministically from
//!   `(x, y, m, K)` and the nonce aggregate, so every signer computes
//!   identical `(e, r₁, r₂)`
//!
//! Aggregation sums the partial `U`-responses and yields a proof
//! indistinguishable from the single-signer form.
//!
//! Nonces are derived deterministically from a per-signer seed and the
//! signing context `(m, K, filter)`: re-running a signing attempt for the
//! same context reproduces the same partial, and any change to the message
//! or proof key produces fresh nonces.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::composition::proof::{challenge, proof_keys_from_witness, CompositionProof};
use crate::generators::{GEN_U, GEN_X};
use crate::hashing::hash_to_scalar;
use crate::types::errors::{CoreError, CoreResult};

/// A signer's secret dual nonces for one signing attempt.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MultisigNoncePair {
    alpha_1: Scalar,
    alpha_2: Scalar,
}

/// The public side of a [`MultisigNoncePair`]: `(α₁·U, α₂·U)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigPubNonces {
    /// First nonce point `D₁ = α₁·U`.
    pub nonce_1: EdwardsPoint,
    /// Second nonce point `D₂ = α₂·U`.
    pub nonce_2: EdwardsPoint,
}

/// One signer's contribution to a composition proof. The shared fields
/// `(e, r₁, r₂)` must agree across all partials of an attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompositionProofPartial {
    /// Message the proof is bound to.
    pub message: [u8; 32],
    /// Proof key `K`.
    pub proof_key: EdwardsPoint,
    /// Key image `KI = (z/y)·U`.
    pub key_image: EdwardsPoint,
    /// Challenge `e` (common).
    pub challenge: Scalar,
    /// `G`-side response `r₁` (common).
    pub response_g: Scalar,
    /// `X`-side response `r₂` (common).
    pub response_x: Scalar,
    /// This signer's share of the `U`-side response.
    pub partial_response_u: Scalar,
}

impl MultisigNoncePair {
    /// Derive the dual nonces for signing context `(message, proof_key,
    /// filter)` from a per-signer secret seed.
    #[must_use]
    pub fn derive(
        nonce_seed: &Scalar,
        message: &[u8; 32],
        proof_key: &EdwardsPoint,
        filter: u32,
    ) -> Self {
        let proof_key_bytes = proof_key.compress();
        let context: [&[u8]; 4] = [
            nonce_seed.as_bytes(),
            message,
            proof_key_bytes.as_bytes(),
            &filter.to_le_bytes(),
        ];
        Self {
            alpha_1: hash_to_scalar(b"sp_multisig_nonce_1", &context),
            alpha_2: hash_to_scalar(b"sp_multisig_nonce_2", &context),
        }
    }

    /// Public nonce points to exchange with the other signers.
    #[must_use]
    pub fn pub_nonces(&self) -> MultisigPubNonces {
        MultisigPubNonces {
            nonce_1: self.alpha_1 * *GEN_U,
            nonce_2: self.alpha_2 * *GEN_U,
        }
    }
}

/// Binding factor `ρ` tying each signer's second nonce to the full nonce
/// set. All signers must hash the nonce list in the same order.
fn binding_factor(
    message: &[u8; 32],
    proof_key: &EdwardsPoint,
    pub_nonces: &[MultisigPubNonces],
) -> Scalar {
    let proof_key_bytes = proof_key.compress();
    let nonce_bytes: Vec<[u8; 64]> = pub_nonces
        .iter()
        .map(|n| {
            let mut buf = [0u8; 64];
            buf[..32].copy_from_slice(n.nonce_1.compress().as_bytes());
            buf[32..].copy_from_slice(n.nonce_2.compress().as_bytes());
            buf
        })
        .collect();

    let mut parts: Vec<&[u8]> = vec![message, proof_key_bytes.as_bytes()];
    for buf in &nonce_bytes {
        parts.push(buf);
    }
    hash_to_scalar(b"sp_multisig_binding_factor", &parts)
}

/// Common nonces `(a, b)` for the `G` and `X` relations, derived from the
/// common witness components and the nonce aggregate so that every signer
/// computes the same values.
fn common_nonces(
    x: &Scalar,
    y: &Scalar,
    message: &[u8; 32],
    proof_key: &EdwardsPoint,
    nonce_aggregate: &EdwardsPoint,
) -> (Scalar, Scalar) {
    let proof_key_bytes = proof_key.compress();
    let aggregate_bytes = nonce_aggregate.compress();
    let context: [&[u8]; 5] = [
        x.as_bytes(),
        y.as_bytes(),
        message,
        proof_key_bytes.as_bytes(),
        aggregate_bytes.as_bytes(),
    ];
    (
        hash_to_scalar(b"sp_multisig_common_nonce_g", &context),
        hash_to_scalar(b"sp_multisig_common_nonce_x", &context),
    )
}

/// Produce this signer's partial signature.
///
/// `z_pubkey` is the aggregate `z·U` (for an input image, the base spend
/// key minus `k_vb·X`), `z_share` the signer's Shamir share of `z`, and
/// `lagrange_weight` the Lagrange coefficient for this signer within the
/// active subset. `all_pub_nonces` must be the subset's nonce list in
/// canonical (signer-index) order and must contain this signer's own
/// public nonces.
///
/// # Errors
/// `CompositionProofFailed` on a degenerate witness;
/// `PartialSignatureMismatch` if the signer's nonces are missing from the
/// nonce list.
#[allow(clippy::too_many_arguments)]
pub fn make_partial_signature(
    message: &[u8; 32],
    x: &Scalar,
    y: &Scalar,
    z_pubkey: &EdwardsPoint,
    z_share: &Scalar,
    lagrange_weight: &Scalar,
    signer_nonces: &MultisigNoncePair,
    all_pub_nonces: &[MultisigPubNonces],
) -> CoreResult<CompositionProofPartial> {
    if *z_share == Scalar::ZERO {
        return Err(CoreError::CompositionProofFailed(
            "signer spend-key share is zero".into(),
        ));
    }
    if all_pub_nonces.is_empty() {
        return Err(CoreError::PartialSignatureMismatch(
            "empty nonce list".into(),
        ));
    }
    let own_pub = signer_nonces.pub_nonces();
    if !all_pub_nonces.contains(&own_pub) {
        return Err(CoreError::PartialSignatureMismatch(
            "signer nonces missing from nonce list".into(),
        ));
    }

    let (proof_key, key_image) = proof_keys_from_witness(x, y, z_pubkey)?;

    let rho = binding_factor(message, &proof_key, all_pub_nonces);
    let nonce_aggregate = all_pub_nonces
        .iter()
        .fold(EdwardsPoint::identity(), |acc, n| {
            acc + n.nonce_1 + rho * n.nonce_2
        });

    let (a, b) = common_nonces(x, y, message, &proof_key, &nonce_aggregate);

    let nonce_point_1 = EdwardsPoint::mul_base(&a) + b * *GEN_X + nonce_aggregate;
    let nonce_point_2 = b * key_image - nonce_aggregate;

    let e = challenge(message, &proof_key, &key_image, &nonce_point_1, &nonce_point_2);

    Ok(CompositionProofPartial {
        message: *message,
        proof_key,
        key_image,
        challenge: e,
        response_g: a + e * x,
        response_x: b + e * y,
        partial_response_u: (signer_nonces.alpha_1 + rho * signer_nonces.alpha_2)
            + e * lagrange_weight * z_share,
    })
}

/// Check one partial against its signer's public data.
///
/// `weighted_share_pubkey` is `λ_i·z_i·U`, the signer's Lagrange-weighted
/// public key share for the active subset.
///
/// # Errors
/// `PartialSignatureInvalid` naming `signer_slot` if the response does not
/// open against the signer's nonces and share.
pub fn verify_partial_signature(
    partial: &CompositionProofPartial,
    signer_pub_nonces: &MultisigPubNonces,
    all_pub_nonces: &[MultisigPubNonces],
    weighted_share_pubkey: &EdwardsPoint,
    signer_slot: usize,
) -> CoreResult<()> {
    let rho = binding_factor(&partial.message, &partial.proof_key, all_pub_nonces);
    let expected = signer_pub_nonces.nonce_1
        + rho * signer_pub_nonces.nonce_2
        + partial.challenge * weighted_share_pubkey;
    if partial.partial_response_u * *GEN_U == expected {
        Ok(())
    } else {
        Err(CoreError::PartialSignatureInvalid { signer_slot })
    }
}

/// Combine partials from one signing attempt into a full proof.
///
/// All partials must share `(m, K, KI, e, r₁, r₂)`; the `U`-responses sum.
/// The assembled proof is verified before being returned.
///
/// # Errors
/// `PartialSignatureMismatch` if the partial set is empty or inconsistent;
/// `CompositionProofInvalid` if the assembled proof does not verify (some
/// partial was wrong despite being consistent).
pub fn aggregate_partial_signatures(
    partials: &[CompositionProofPartial],
) -> CoreResult<CompositionProof> {
    let first = partials.first().ok_or_else(|| {
        CoreError::PartialSignatureMismatch("no partial signatures".into())
    })?;

    for partial in &partials[1..] {
        let consistent = partial.message == first.message
            && partial.proof_key == first.proof_key
            && partial.key_image == first.key_image
            && partial.challenge == first.challenge
            && partial.response_g == first.response_g
            && partial.response_x == first.response_x;
        if !consistent {
            return Err(CoreError::PartialSignatureMismatch(
                "partials disagree on shared proof fields".into(),
            ));
        }
    }

    let response_u = partials
        .iter()
        .fold(Scalar::ZERO, |acc, p| acc + p.partial_response_u);

    let proof = CompositionProof {
        challenge: first.challenge,
        response_g: first.response_g,
        response_x: first.response_x,
        response_u,
    };
    proof.verify(&first.message, &first.proof_key, &first.key_image)?;
    Ok(proof)
}
