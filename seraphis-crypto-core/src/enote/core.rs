//! The enote data model and the sender/receiver derivations behind it.
//!
//! An enote is the on-chain record of one output:
//!
//! ```text
//! (Ko, C, view_tag, enc_amount, addr_tag_enc)
//! ```
//!
//! plus an ephemeral pubkey `K_e` carried in the transaction supplement.
//! All per-enote secrets flow from the sender-receiver secret `q`:
//!
//! ```text
//! D  = r·K_ua_j            (sender)  =  k_fr⁻¹·K_e   (receiver)
//! q  = H_n("sender_receiver_secret" ‖ D ‖ K_e)            [plain]
//! q  = H_n("selfsend_secret_<type>" ‖ k_vb ‖ K_e)         [self-send]
//! Ko = K₁_j + H_n("onetime_ext_g" ‖ q ‖ C)·G + H_n("onetime_ext_x" ‖ q ‖ C)·X
//! ```
//!
//! The one-byte view tag `H₁("view_tag" ‖ D ‖ K_e)` lets a scanner discard
//! foreign enotes after a single DH operation.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use serde::{Deserialize, Serialize};

use crate::cipher::AddressTag;
use crate::generators::GEN_X;
use crate::hashing::{hash_to_byte, hash_to_bytes, hash_to_scalar};

/// Width of the encrypted-amount field: the full 64-bit amount XORed with
/// an 8-byte pad (no MAC; integrity comes from recomputing `C`).
pub const ENCRYPTED_AMOUNT_BYTES: usize = 8;

/// Flavor of a self-send enote, encoded in the secret's domain separator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelfSendType {
    /// Change returned to the sender.
    Change,
    /// A deliberate spend to oneself.
    SelfSpend,
    /// A zero-value output added to satisfy output-set rules.
    Dummy,
}

impl SelfSendType {
    /// All flavors, in scan order.
    pub const ALL: [SelfSendType; 3] =
        [SelfSendType::Change, SelfSendType::SelfSpend, SelfSendType::Dummy];

    pub(crate) fn secret_domain(self) -> &'static [u8] {
        match self {
            SelfSendType::Change => b"jamtis_selfsend_secret_change",
            SelfSendType::SelfSpend => b"jamtis_selfsend_secret_self_spend",
            SelfSendType::Dummy => b"jamtis_selfsend_secret_dummy",
        }
    }
}

/// Whether an enote was addressed externally or by its own wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnoteType {
    /// External payment.
    Plain,
    /// Change, dummy, or self-spend.
    SelfSend(SelfSendType),
}

/// An on-chain output record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enote {
    /// One-time address `Ko` (prime subgroup).
    pub onetime_address: EdwardsPoint,
    /// Amount commitment `C = x·G + a·H`.
    pub amount_commitment: EdwardsPoint,
    /// One-byte view tag.
    pub view_tag: u8,
    /// Amount XORed with the amount pad.
    pub encrypted_amount: [u8; ENCRYPTED_AMOUNT_BYTES],
    /// Pad-encrypted ciphered address tag.
    pub encrypted_address_tag: AddressTag,
}

/// The spent form of an enote carried in a transaction input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnoteImage {
    /// Masked one-time address `K̃o = t_k·G + Ko`.
    pub masked_address: EdwardsPoint,
    /// Masked (pseudo-output) commitment `C̃ = C + t_c·G`.
    pub masked_commitment: EdwardsPoint,
    /// Key image in compact form `(1/8)·KI`.
    pub compact_key_image: EdwardsPoint,
}

// =============================================================================
// Sender-receiver derivations
// =============================================================================

/// Sender-receiver secret for a plain enote.
#[must_use]
pub fn sender_receiver_secret_plain(dh: &EdwardsPoint, ephemeral_pubkey: &EdwardsPoint) -> Scalar {
    hash_to_scalar(
        b"jamtis_sender_receiver_secret",
        &[
            dh.compress().as_bytes(),
            ephemeral_pubkey.compress().as_bytes(),
        ],
    )
}

/// Sender-receiver secret for a self-send enote.
#[must_use]
pub fn sender_receiver_secret_selfsend(
    self_send_type: SelfSendType,
    k_vb: &Scalar,
    ephemeral_pubkey: &EdwardsPoint,
) -> Scalar {
    hash_to_scalar(
        self_send_type.secret_domain(),
        &[k_vb.as_bytes(), ephemeral_pubkey.compress().as_bytes()],
    )
}

/// One-byte view tag.
#[must_use]
pub fn make_view_tag(dh: &EdwardsPoint, ephemeral_pubkey: &EdwardsPoint) -> u8 {
    hash_to_byte(
        b"jamtis_view_tag",
        &[
            dh.compress().as_bytes(),
            ephemeral_pubkey.compress().as_bytes(),
        ],
    )
}

/// Sender extension on `G` for the one-time address.
#[must_use]
pub fn onetime_extension_g(q: &Scalar, amount_commitment: &EdwardsPoint) -> Scalar {
    hash_to_scalar(
        b"jamtis_onetime_extension_g",
        &[q.as_bytes(), amount_commitment.compress().as_bytes()],
    )
}

/// Sender extension on `X` for the one-time address.
#[must_use]
pub fn onetime_extension_x(q: &Scalar, amount_commitment: &EdwardsPoint) -> Scalar {
    hash_to_scalar(
        b"jamtis_onetime_extension_x",
        &[q.as_bytes(), amount_commitment.compress().as_bytes()],
    )
}

/// Build the one-time address `Ko` from the indexed spend key.
#[must_use]
pub fn make_onetime_address(
    q: &Scalar,
    amount_commitment: &EdwardsPoint,
    indexed_spend_pubkey: &EdwardsPoint,
) -> EdwardsPoint {
    let ext_g = onetime_extension_g(q, amount_commitment);
    let ext_x = onetime_extension_x(q, amount_commitment);
    indexed_spend_pubkey + EdwardsPoint::mul_base(&ext_g) + ext_x * *GEN_X
}

/// Commitment blinding factor `x = H_n("commitment_mask" ‖ q)`.
#[must_use]
pub fn amount_blinding_factor(q: &Scalar) -> Scalar {
    hash_to_scalar(b"jamtis_commitment_mask", &[q.as_bytes()])
}

/// The amount baked key for self-sends: the identity point (the secret `q`
/// already requires `k_vb`, which dominates `k_ua`).
#[must_use]
pub fn selfsend_baked_key() -> EdwardsPoint {
    EdwardsPoint::identity()
}

fn amount_pad(q: &Scalar, baked_key: &EdwardsPoint) -> [u8; ENCRYPTED_AMOUNT_BYTES] {
    let digest = hash_to_bytes(
        b"jamtis_encrypt_amount",
        &[q.as_bytes(), baked_key.compress().as_bytes()],
    );
    let mut pad = [0u8; ENCRYPTED_AMOUNT_BYTES];
    pad.copy_from_slice(&digest[..ENCRYPTED_AMOUNT_BYTES]);
    pad
}

/// XOR-encrypt an amount under `(q, baked_key)`.
#[must_use]
pub fn encrypt_amount(
    amount: u64,
    q: &Scalar,
    baked_key: &EdwardsPoint,
) -> [u8; ENCRYPTED_AMOUNT_BYTES] {
    let mut out = amount.to_le_bytes();
    for (byte, pad_byte) in out.iter_mut().zip(amount_pad(q, baked_key).iter()) {
        *byte ^= pad_byte;
    }
    out
}

/// Inverse of [`encrypt_amount`].
#[must_use]
pub fn decrypt_amount(
    encrypted: &[u8; ENCRYPTED_AMOUNT_BYTES],
    q: &Scalar,
    baked_key: &EdwardsPoint,
) -> u64 {
    let mut out = *encrypted;
    for (byte, pad_byte) in out.iter_mut().zip(amount_pad(q, baked_key).iter()) {
        *byte ^= pad_byte;
    }
    u64::from_le_bytes(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_encryption_round_trip() {
        let q = Scalar::from(9u64);
        let baked = EdwardsPoint::mul_base(&Scalar::from(3u64));
        for amount in [0u64, 1, u64::MAX, 123_456_789] {
            let enc = encrypt_amount(amount, &q, &baked);
            assert_eq!(decrypt_amount(&enc, &q, &baked), amount);
        }
    }

    #[test]
    fn test_amount_pad_depends_on_baked_key() {
        let q = Scalar::from(9u64);
        let a = encrypt_amount(5, &q, &EdwardsPoint::mul_base(&Scalar::from(1u64)));
        let b = encrypt_amount(5, &q, &EdwardsPoint::mul_base(&Scalar::from(2u64)));
        assert_ne!(a, b);
    }

    #[test]
    fn test_selfsend_secrets_domain_separated() {
        let k_vb = Scalar::from(4u64);
        let ke = EdwardsPoint::mul_base(&Scalar::from(6u64));
        let change = sender_receiver_secret_selfsend(SelfSendType::Change, &k_vb, &ke);
        let dummy = sender_receiver_secret_selfsend(SelfSendType::Dummy, &k_vb, &ke);
        assert_ne!(change, dummy);
    }

    #[test]
    fn test_onetime_address_binds_commitment() {
        let q = Scalar::from(2u64);
        let k1j = EdwardsPoint::mul_base(&Scalar::from(10u64));
        let c1 = EdwardsPoint::mul_base(&Scalar::from(20u64));
        let c2 = EdwardsPoint::mul_base(&Scalar::from(21u64));
        assert_ne!(
            make_onetime_address(&q, &c1, &k1j).compress(),
            make_onetime_address(&q, &c2, &k1j).compress()
        );
    }
}
