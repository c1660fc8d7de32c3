//! Composition proofs: spend authority plus the linking-tag relation.
//!
//! A composition proof for a proof key `K = x·G + y·X + z·U` demonstrates
//! knowledge of `(x, y, z)` and that the attached key image satisfies
//! `KI = (z/y)·U`. Transactions attach one proof per input, keyed to the
//! input's masked address.
//!
//! [`proof`] is the single-signer form; [`multisig`] splits the `U`-side
//! response across a threshold signer set and aggregates to a proof that is
//! byte-identical to the single-signer form.

pub mod multisig;
pub mod proof;

pub use multisig::{
    aggregate_partial_signatures, make_partial_signature, verify_partial_signature,
    CompositionProofPartial, MultisigNoncePair, MultisigPubNonces,
};
pub use proof::CompositionProof;
