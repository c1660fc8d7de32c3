//! # seraphis-crypto-core
//!
//! Core cryptographic library for the Seraphis transaction protocol:
//!
//! - **Key hierarchy**: capability-partitioned wallet keys (view-balance,
//!   unlock-amounts, find-received, generate-address, cipher-tag)
//! - **Addresses**: indexed destinations with ciphered address tags
//! - **Enotes**: output construction from payment/self-send proposals and
//!   the three-level owned-output record hierarchy (basic, intermediate, full)
//! - **Composition proofs**: spend-authority proofs over `K = xG + yX + zU`
//!   with the linking-tag relation `KI = (z/y)U`, single-signer and
//!   threshold-multisig modes
//! - **Membership proofs**: ring proofs over binned reference sets
//! - **Balance proofs**: pseudo-commitment mask closure and the range-proof
//!   seam
//!
//! ## Architecture
//!
//! 1. **No I/O**: every function here is a pure computation over curve
//!    elements and byte strings; scanning and transaction orchestration
//!    live in `seraphis-wallet`
//! 2. **Constant-time verdicts**: ownership checks (view tags, address-tag
//!    MACs) do not branch on secret data
//! 3. **Zeroize on drop**: secret scalars are cleared from memory
//!
//! ## Modules
//!
//! - [`types`]: error types and shared constants
//! - [`generators`]: the fixed generators `G`, `X`, `U`, `H` and Pedersen
//!   commitments
//! - [`keys`]: key hierarchy, destinations, key images
//! - [`cipher`]: the 16-byte address-tag cipher
//! - [`enote`]: enote data model, payment proposals, record recovery
//! - [`composition`]: composition proofs (single-sig and multisig)
//! - [`membership`]: binned reference sets and membership proofs
//! - [`balance`]: balance proofs and the range-proof seam

#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(non_snake_case)]

pub mod balance;
pub mod cipher;
pub mod composition;
pub mod enote;
pub mod generators;
pub mod hashing;
pub mod keys;
pub mod membership;
pub mod types;

pub use types::errors::{CoreError, CoreResult};

pub use generators::{commit, GEN_G, GEN_H, GEN_U, GEN_X};

pub use keys::address::{make_destination, try_recover_address_index, Destination};
pub use keys::hierarchy::{
    GenerateAddressKeys, IntermediateViewKeys, ViewBalanceKeys, WalletKeys, MAX_ADDRESS_INDEX,
};
pub use keys::image::{compress_key_image, decompress_key_image, make_key_image};

pub use cipher::{AddressTag, AddressTagCipher, ADDRESS_TAG_BYTES, ADDRESS_TAG_MAC_BYTES};

pub use enote::core::{Enote, EnoteImage, SelfSendType};
pub use enote::proposal::{OutputProposal, PaymentProposal, SelfSendProposal};
pub use enote::record::{
    try_basic_record, try_full_record, try_intermediate_record, BasicRecord, EnoteRecordVariant,
    FullRecord, IntermediateRecord,
};

pub use composition::proof::CompositionProof;
pub use composition::multisig::{
    aggregate_partial_signatures, CompositionProofPartial, MultisigNoncePair, MultisigPubNonces,
};

pub use membership::binned::{check_bin_config, BinConfig, BinnedReferenceSet};
pub use membership::proof::MembershipProof;

pub use balance::{make_pseudo_blinding_factors, verify_balance_equality, BalanceProof};
