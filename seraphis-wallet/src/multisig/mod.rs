//! `t`-of-`n` multisig accounts and the signing protocol.
//!
//! Key exchange produces an account whose base spend key is
//! `K₁ = k_vb·X + z·U`, with `z` Shamir-shared across the signer group
//! (Feldman commitments make every dealt share verifiable) and `k_vb`
//! common knowledge within the group. Because only `z` is split, a signer
//! group can scan and build unsigned transactions exactly like a
//! view-balance wallet; spend authority alone needs a threshold.
//!
//! Signing runs over a [`crate::builder::PartialTx`]. A proposal invites
//! any set of at least `t` signers; every threshold-sized subset of the
//! invitation is an independent signing attempt:
//!
//! 1. each invited signer records nonces for every attempt it belongs to
//!    ([`NonceRecord`] refuses a second initialization per context)
//! 2. public nonces are exchanged per attempt, each signer emits one
//!    partial signature per input per attempt it completes
//! 3. anyone holding a full partial set for any one attempt assembles and
//!    verifies the final transaction

mod account;
mod signing;

pub use account::{
    filter_from_signers, lagrange_weight, run_key_exchange, signer_subsets, signers_in_filter,
    KexRound1Message, KexSession, MultisigAccount, SignerSetFilter, MAX_SIGNERS,
};
pub use signing::{
    assemble_transaction, MultisigPartialSet, MultisigTxProposal, NonceRecord,
};
