//! Fixed generators for the Seraphis core.
//!
//! Four independent generators are used:
//!
//! - `G`: the Ed25519 basepoint (masks and commitment blinding factors)
//! - `X`: the view-balance generator (`K₁ = k_vb·X + k_m·U`)
//! - `U`: the spend generator (key images live on `U`)
//! - `H`: the amount generator (`C = x·G + a·H`)
//!
//! `X`, `U` and `H` are nothing-up-my-sleeve points: each is
//! `hash_to_point(Keccak256(domain))` for a fixed ASCII domain string, so
//! no party knows a discrete-log relation between any pair of generators.
//! `hash_to_point` (Monero's `ge_fromfe_frombytes_vartime` construction)
//! always lands in the prime-order subgroup.

use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use monero_generators::hash_to_point;
use once_cell::sync::Lazy;
use sha3::{Digest, Keccak256};

/// The Ed25519 basepoint `G`.
pub static GEN_G: Lazy<EdwardsPoint> = Lazy::new(|| ED25519_BASEPOINT_POINT);

/// The view-balance generator `X`.
pub static GEN_X: Lazy<EdwardsPoint> = Lazy::new(|| nums_generator(b"seraphis_generator_X"));

/// The spend generator `U`.
pub static GEN_U: Lazy<EdwardsPoint> = Lazy::new(|| nums_generator(b"seraphis_generator_U"));

/// The amount generator `H`.
pub static GEN_H: Lazy<EdwardsPoint> = Lazy::new(|| nums_generator(b"seraphis_generator_H"));

/// `1/8` mod the curve order, for compact key-image encoding.
pub static INV_EIGHT: Lazy<Scalar> = Lazy::new(|| Scalar::from(8u8).invert());

fn nums_generator(domain: &[u8]) -> EdwardsPoint {
    let mut hasher = Keccak256::new();
    hasher.update(domain);
    let seed: [u8; 32] = hasher.finalize().into();
    hash_to_point(seed)
}

/// Pedersen amount commitment `C = x·G + a·H`.
#[must_use]
pub fn commit(amount: u64, blinding: &Scalar) -> EdwardsPoint {
    EdwardsPoint::mul_base(blinding) + Scalar::from(amount) * *GEN_H
}

/// A zero-amount commitment `C = x·G` (used by dummy outputs).
#[must_use]
pub fn commit_zero(blinding: &Scalar) -> EdwardsPoint {
    EdwardsPoint::mul_base(blinding)
}
