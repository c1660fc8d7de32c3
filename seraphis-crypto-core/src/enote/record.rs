//! Owned-output recovery: the basic → intermediate → full record hierarchy.
//!
//! Each level is strictly more informative and needs strictly more key
//! material:
//!
//! | level        | needs                  | yields                            |
//! |--------------|------------------------|-----------------------------------|
//! | basic        | `k_fr`                 | DH, nominal secret, nominal `K₁_j`|
//! | intermediate | `k_ua, k_fr, s_ga, s_ct` | index `j`, amount, blinding     |
//! | full         | `k_vb`                 | enote view privkey, key image,    |
//! |              |                        | self-send detection               |
//!
//! The split lets an untrusted scanner (find-received daemon) or a payment
//! validator do the bulk of the work without being able to spend or even
//! determine spend status. "Not mine" is always `None`, never an error.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;

use crate::cipher::{decrypt_address_tag, AddressTagCipher};
use crate::enote::core::{
    amount_blinding_factor, decrypt_amount, make_view_tag, onetime_extension_g,
    onetime_extension_x, selfsend_baked_key, sender_receiver_secret_plain,
    sender_receiver_secret_selfsend, Enote, EnoteType, SelfSendType,
};
use crate::generators::{commit, GEN_X};
use crate::keys::address::{
    address_extension_g, address_extension_x, address_privkey, make_indexed_spend_pubkey,
};
use crate::keys::hierarchy::{IntermediateViewKeys, ViewBalanceKeys};
use crate::keys::image::{key_image_spend_component, make_key_image};

/// Scanning-level record: the view tag matched and the DH is recomputed.
#[derive(Clone, Debug)]
pub struct BasicRecord {
    /// The enote itself.
    pub enote: Enote,
    /// Ephemeral pubkey `K_e` the enote was found with.
    pub enote_ephemeral_pubkey: EdwardsPoint,
    /// Recomputed sender-receiver DH `D = k_fr⁻¹·K_e`.
    pub sender_receiver_dh: EdwardsPoint,
    /// Nominal (plain-interpretation) sender-receiver secret.
    pub nominal_sender_receiver_secret: Scalar,
    /// Nominal indexed spend key `Ko − ext_g·G − ext_x·X`.
    pub nominal_spend_pubkey: EdwardsPoint,
}

/// Payment-validator record: index and amount recovered, commitment checked.
#[derive(Clone, Debug)]
pub struct IntermediateRecord {
    /// The enote itself.
    pub enote: Enote,
    /// Ephemeral pubkey `K_e`.
    pub enote_ephemeral_pubkey: EdwardsPoint,
    /// Plaintext amount.
    pub amount: u64,
    /// Commitment blinding factor.
    pub amount_blinding: Scalar,
    /// Recovered address index.
    pub address_index: u64,
}

/// Full record: everything needed to track and later spend the enote.
#[derive(Clone, Debug)]
pub struct FullRecord {
    /// The enote itself.
    pub enote: Enote,
    /// Ephemeral pubkey `K_e`.
    pub enote_ephemeral_pubkey: EdwardsPoint,
    /// Plaintext amount.
    pub amount: u64,
    /// Commitment blinding factor.
    pub amount_blinding: Scalar,
    /// Recovered address index.
    pub address_index: u64,
    /// Plain or self-send (with flavor).
    pub enote_type: EnoteType,
    /// `G`-component of the enote view key: `k^j_g + k^o_g`.
    pub enote_view_extension_g: Scalar,
    /// Enote view privkey `y = k_vb + k^j_x + k^o_x`.
    pub enote_view_privkey: Scalar,
    /// Key image `KI = (z/y)·U`.
    pub key_image: EdwardsPoint,
}

/// The widening record hierarchy as a tagged union. Code paths that accept
/// a record state which variant they need by matching.
#[derive(Clone, Debug)]
pub enum EnoteRecordVariant {
    /// Scanning-level information only.
    Basic(BasicRecord),
    /// Amount recovered, key image unavailable.
    Intermediate(IntermediateRecord),
    /// Complete ownership information.
    Full(FullRecord),
}

/// Try to interpret an enote as owned, using only the find-received key.
///
/// Fails fast (returns `None`) when the view tag does not match.
#[must_use]
pub fn try_basic_record(
    enote: &Enote,
    enote_ephemeral_pubkey: &EdwardsPoint,
    k_fr: &Scalar,
) -> Option<BasicRecord> {
    let dh = k_fr.invert() * enote_ephemeral_pubkey;
    if make_view_tag(&dh, enote_ephemeral_pubkey) != enote.view_tag {
        return None;
    }

    let q = sender_receiver_secret_plain(&dh, enote_ephemeral_pubkey);
    let ext_g = onetime_extension_g(&q, &enote.amount_commitment);
    let ext_x = onetime_extension_x(&q, &enote.amount_commitment);
    let nominal_spend_pubkey =
        enote.onetime_address - EdwardsPoint::mul_base(&ext_g) - ext_x * *GEN_X;

    Some(BasicRecord {
        enote: enote.clone(),
        enote_ephemeral_pubkey: *enote_ephemeral_pubkey,
        sender_receiver_dh: dh,
        nominal_sender_receiver_secret: q,
        nominal_spend_pubkey,
    })
}

/// Promote a basic record by recovering the address index and amount.
///
/// Confirms the nominal spend pubkey against the regenerated address for
/// the deciphered index and checks the amount against the commitment.
/// Self-sends are invisible at this level (their secrets require `k_vb`).
#[must_use]
pub fn try_intermediate_record(
    basic: &BasicRecord,
    keys: &IntermediateViewKeys,
) -> Option<IntermediateRecord> {
    let q = &basic.nominal_sender_receiver_secret;

    let tag = decrypt_address_tag(q, &basic.enote.onetime_address, &basic.enote.encrypted_address_tag);
    let j = AddressTagCipher::new(&keys.s_ct).try_decipher_index(&tag)?;

    let expected_spend =
        make_indexed_spend_pubkey(&keys.s_ga, &keys.base_spend_pubkey, j);
    if expected_spend != basic.nominal_spend_pubkey {
        return None;
    }

    // Amount baked key: (d_j · k_fr · k_ua)⁻¹ · K_e = r·G.
    let d_j = address_privkey(&keys.s_ga, &keys.base_spend_pubkey, j);
    let baked_key = (d_j * keys.k_fr * keys.k_ua).invert() * basic.enote_ephemeral_pubkey;

    let amount = decrypt_amount(&basic.enote.encrypted_amount, q, &baked_key);
    let amount_blinding = amount_blinding_factor(q);
    if commit(amount, &amount_blinding) != basic.enote.amount_commitment {
        return None;
    }

    Some(IntermediateRecord {
        enote: basic.enote.clone(),
        enote_ephemeral_pubkey: basic.enote_ephemeral_pubkey,
        amount,
        amount_blinding,
        address_index: j,
    })
}

/// Try to recover a full record with the view-balance keys.
///
/// Attempts the plain interpretation first, then each self-send flavor.
#[must_use]
pub fn try_full_record(
    enote: &Enote,
    enote_ephemeral_pubkey: &EdwardsPoint,
    view_balance: &ViewBalanceKeys,
) -> Option<FullRecord> {
    let basic = try_basic_record(enote, enote_ephemeral_pubkey, &view_balance.k_fr)?;

    // Plain interpretation.
    if let Some(intermediate) =
        try_intermediate_record(&basic, &view_balance.intermediate_keys())
    {
        let q = basic.nominal_sender_receiver_secret;
        return complete_full_record(
            enote,
            enote_ephemeral_pubkey,
            view_balance,
            &q,
            intermediate.amount,
            intermediate.amount_blinding,
            intermediate.address_index,
            EnoteType::Plain,
        );
    }

    // Self-send interpretations.
    for self_send_type in SelfSendType::ALL {
        if let Some(record) = try_selfsend_record(
            enote,
            enote_ephemeral_pubkey,
            view_balance,
            self_send_type,
        ) {
            return Some(record);
        }
    }

    None
}

fn try_selfsend_record(
    enote: &Enote,
    enote_ephemeral_pubkey: &EdwardsPoint,
    view_balance: &ViewBalanceKeys,
    self_send_type: SelfSendType,
) -> Option<FullRecord> {
    let q = sender_receiver_secret_selfsend(
        self_send_type,
        &view_balance.k_vb,
        enote_ephemeral_pubkey,
    );

    let tag = decrypt_address_tag(&q, &enote.onetime_address, &enote.encrypted_address_tag);
    let j = AddressTagCipher::new(&view_balance.s_ct).try_decipher_index(&tag)?;

    // The one-time address must reproduce exactly for this flavor's secret.
    let expected_spend =
        make_indexed_spend_pubkey(&view_balance.s_ga, &view_balance.base_spend_pubkey, j);
    let ext_g = onetime_extension_g(&q, &enote.amount_commitment);
    let ext_x = onetime_extension_x(&q, &enote.amount_commitment);
    if expected_spend + EdwardsPoint::mul_base(&ext_g) + ext_x * *GEN_X != enote.onetime_address {
        return None;
    }

    let amount = decrypt_amount(&enote.encrypted_amount, &q, &selfsend_baked_key());
    let amount_blinding = amount_blinding_factor(&q);
    if commit(amount, &amount_blinding) != enote.amount_commitment {
        return None;
    }

    complete_full_record(
        enote,
        enote_ephemeral_pubkey,
        view_balance,
        &q,
        amount,
        amount_blinding,
        j,
        EnoteType::SelfSend(self_send_type),
    )
}

#[allow(clippy::too_many_arguments)]
fn complete_full_record(
    enote: &Enote,
    enote_ephemeral_pubkey: &EdwardsPoint,
    view_balance: &ViewBalanceKeys,
    q: &Scalar,
    amount: u64,
    amount_blinding: Scalar,
    address_index: u64,
    enote_type: EnoteType,
) -> Option<FullRecord> {
    let s_ga = &view_balance.s_ga;
    let base = &view_balance.base_spend_pubkey;

    let enote_view_extension_g = address_extension_g(s_ga, base, address_index)
        + onetime_extension_g(q, &enote.amount_commitment);
    let enote_view_privkey = view_balance.k_vb
        + address_extension_x(s_ga, base, address_index)
        + onetime_extension_x(q, &enote.amount_commitment);

    let spend_component = key_image_spend_component(base, &view_balance.k_vb);
    let key_image = make_key_image(&enote_view_privkey, &spend_component).ok()?;

    Some(FullRecord {
        enote: enote.clone(),
        enote_ephemeral_pubkey: *enote_ephemeral_pubkey,
        amount,
        amount_blinding,
        address_index,
        enote_type,
        enote_view_extension_g,
        enote_view_privkey,
        key_image,
    })
}
