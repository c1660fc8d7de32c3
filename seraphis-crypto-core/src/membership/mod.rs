//! Membership proofs over binned reference sets.
//!
//! A transaction input hides its real enote inside a reference set of
//! on-chain enotes. [`binned`] compresses the set into a handful of bin
//! loci plus a shared seed and rotation factor; [`proof`] proves that the
//! input's masked address and masked commitment re-blind *some* member of
//! the expanded set, without revealing which.

pub mod binned;
pub mod proof;

pub use binned::{check_bin_config, BinConfig, BinnedReferenceSet};
pub use proof::MembershipProof;
