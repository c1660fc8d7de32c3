//! Payment and self-send proposals: the producer side of the enote engine.
//!
//! A proposal is intent plus an ephemeral secret; `output_proposal()`
//! turns it into a concrete enote plus the private data the builder needs
//! (amount and blinding factor).
//!
//! Self-sends come in two flavors:
//!
//! - **normal**: an independent ephemeral key, like any payment
//! - **special**: reuses another output's ephemeral pubkey, so a 2-output
//!   transaction can carry a single `K_e` while still containing the
//!   mandatory self-send
//!
//! Within one transaction, two self-sends of the same type sharing an
//! ephemeral pubkey are forbidden: they would derive identical secrets and
//! hence identical one-time addresses.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::cipher::encrypt_address_tag;
use crate::enote::core::{
    amount_blinding_factor, encrypt_amount, make_onetime_address, make_view_tag,
    selfsend_baked_key, sender_receiver_secret_plain, sender_receiver_secret_selfsend, Enote,
    SelfSendType,
};
use crate::generators::commit;
use crate::keys::address::Destination;
use crate::keys::hierarchy::{random_scalar, ViewBalanceKeys};
use crate::types::errors::{CoreError, CoreResult};

/// A finalized output: the enote, its ephemeral pubkey, and the private
/// opening the builder needs for balance proofs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputProposal {
    /// The enote to be placed on chain.
    pub enote: Enote,
    /// Ephemeral pubkey `K_e` for this output.
    pub enote_ephemeral_pubkey: EdwardsPoint,
    /// Plaintext amount.
    pub amount: u64,
    /// Commitment blinding factor.
    pub amount_blinding: Scalar,
    /// `Some` if this output is a self-send.
    pub self_send_type: Option<SelfSendType>,
    /// Whether this output reuses another output's ephemeral pubkey.
    pub is_special: bool,
}

/// A plain payment intent: destination, amount, fresh ephemeral secret.
#[derive(Clone, Zeroize)]
pub struct PaymentProposal {
    /// Recipient destination.
    #[zeroize(skip)]
    pub destination: Destination,
    /// Amount to send.
    pub amount: u64,
    /// Ephemeral secret `r`.
    pub enote_ephemeral_privkey: Scalar,
}

/// Ephemeral-key mode of a self-send proposal.
#[derive(Clone)]
pub enum EphemeralKey {
    /// Normal self-send: independent ephemeral secret.
    Fresh(Scalar),
    /// Special self-send: reuse this (already computed) ephemeral pubkey.
    Shared(EdwardsPoint),
}

/// A self-send intent addressed to one of the wallet's own destinations.
#[derive(Clone)]
pub struct SelfSendProposal {
    /// One of the wallet's own destinations.
    pub destination: Destination,
    /// Amount (zero for dummies).
    pub amount: u64,
    /// Self-send flavor.
    pub self_send_type: SelfSendType,
    /// Fresh or shared ephemeral key.
    pub ephemeral: EphemeralKey,
}

impl PaymentProposal {
    /// New proposal with a freshly drawn ephemeral secret.
    pub fn new(
        destination: Destination,
        amount: u64,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Self {
        Self {
            destination,
            amount,
            enote_ephemeral_privkey: random_scalar(rng),
        }
    }

    /// Ephemeral pubkey `K_e = r·K_fr_j` this proposal will emit.
    #[must_use]
    pub fn ephemeral_pubkey(&self) -> EdwardsPoint {
        self.enote_ephemeral_privkey * self.destination.findreceived_pubkey
    }

    /// Produce the concrete output.
    ///
    /// # Errors
    /// `InvalidProposal` if the ephemeral secret is zero.
    pub fn output_proposal(&self) -> CoreResult<OutputProposal> {
        let r = &self.enote_ephemeral_privkey;
        if *r == Scalar::ZERO {
            return Err(CoreError::InvalidProposal(
                "payment ephemeral privkey is zero".into(),
            ));
        }

        let ephemeral_pubkey = r * self.destination.findreceived_pubkey;
        let dh = r * self.destination.unlock_pubkey;
        let q = sender_receiver_secret_plain(&dh, &ephemeral_pubkey);

        let amount_blinding = amount_blinding_factor(&q);
        let amount_commitment = commit(self.amount, &amount_blinding);
        let onetime_address =
            make_onetime_address(&q, &amount_commitment, &self.destination.spend_pubkey);

        // Plain amounts bake in r·G so recovery requires the unlock-amounts key.
        let baked_key = EdwardsPoint::mul_base(r);

        Ok(OutputProposal {
            enote: Enote {
                onetime_address,
                amount_commitment,
                view_tag: make_view_tag(&dh, &ephemeral_pubkey),
                encrypted_amount: encrypt_amount(self.amount, &q, &baked_key),
                encrypted_address_tag: encrypt_address_tag(
                    &q,
                    &onetime_address,
                    &self.destination.address_tag,
                ),
            },
            enote_ephemeral_pubkey: ephemeral_pubkey,
            amount: self.amount,
            amount_blinding,
            self_send_type: None,
            is_special: false,
        })
    }
}

impl SelfSendProposal {
    /// Normal self-send with a fresh ephemeral secret.
    pub fn normal(
        destination: Destination,
        amount: u64,
        self_send_type: SelfSendType,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Self {
        Self {
            destination,
            amount,
            self_send_type,
            ephemeral: EphemeralKey::Fresh(random_scalar(rng)),
        }
    }

    /// Special self-send sharing another output's ephemeral pubkey.
    #[must_use]
    pub fn special(
        destination: Destination,
        amount: u64,
        self_send_type: SelfSendType,
        shared_ephemeral_pubkey: EdwardsPoint,
    ) -> Self {
        Self {
            destination,
            amount,
            self_send_type,
            ephemeral: EphemeralKey::Shared(shared_ephemeral_pubkey),
        }
    }

    /// Produce the concrete output. Needs the view-balance keys because
    /// self-send secrets are rooted in `k_vb`.
    ///
    /// # Errors
    /// `InvalidProposal` if a fresh ephemeral secret is zero.
    pub fn output_proposal(&self, view_balance: &ViewBalanceKeys) -> CoreResult<OutputProposal> {
        let (ephemeral_pubkey, is_special) = match &self.ephemeral {
            EphemeralKey::Fresh(r) => {
                if *r == Scalar::ZERO {
                    return Err(CoreError::InvalidProposal(
                        "self-send ephemeral privkey is zero".into(),
                    ));
                }
                (r * self.destination.findreceived_pubkey, false)
            }
            EphemeralKey::Shared(pubkey) => (*pubkey, true),
        };

        // The scanner-visible DH; identical to what a find-received scan computes.
        let dh = view_balance.k_fr.invert() * ephemeral_pubkey;
        let q = sender_receiver_secret_selfsend(
            self.self_send_type,
            &view_balance.k_vb,
            &ephemeral_pubkey,
        );

        let amount_blinding = amount_blinding_factor(&q);
        let amount_commitment = commit(self.amount, &amount_blinding);
        let onetime_address =
            make_onetime_address(&q, &amount_commitment, &self.destination.spend_pubkey);

        Ok(OutputProposal {
            enote: Enote {
                onetime_address,
                amount_commitment,
                view_tag: make_view_tag(&dh, &ephemeral_pubkey),
                encrypted_amount: encrypt_amount(self.amount, &q, &selfsend_baked_key()),
                encrypted_address_tag: encrypt_address_tag(
                    &q,
                    &onetime_address,
                    &self.destination.address_tag,
                ),
            },
            enote_ephemeral_pubkey: ephemeral_pubkey,
            amount: self.amount,
            amount_blinding,
            self_send_type: Some(self.self_send_type),
            is_special,
        })
    }
}
