//! # seraphis-wallet
//!
//! Wallet-side orchestration for the Seraphis transaction protocol,
//! layered on the pure primitives in `seraphis-crypto-core`:
//!
//! - **Scanning**: reorg-safe incremental refresh of an enote store from
//!   an abstract ledger (on-chain chunks, mempool snapshot, partial and
//!   full rescan escalation)
//! - **Enote store**: owned-output records keyed by key image, with
//!   origin/spent contexts and filtered balance queries
//! - **Transaction building**: input selection with fee reconciliation,
//!   output-set finalization, the proposal → partial-tx → transaction
//!   pipeline, and the ordered validation contract
//! - **Multisig**: `t`-of-`n` account key exchange and the multi-round
//!   signing protocol over composition proofs
//!
//! All I/O is abstracted behind the [`ledger::Ledger`] trait; the crate
//! itself performs none. Operations are synchronous; the scan loop offers
//! cooperative cancellation at chunk boundaries.

#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod error;
pub mod fee;
pub mod finalize;
pub mod ledger;
pub mod mock_ledger;
pub mod multisig;
pub mod scan;
pub mod select;
pub mod store;
pub mod validate;
pub mod version;

pub use builder::{
    complete_transaction, make_partial_tx, MembershipProofData, PartialTx, Transaction,
    TxInput, TxProposal, TxSupplement,
};
pub use error::{WalletError, WalletResult};
pub use fee::{amount_from_string, display_amount, DiscretizedFee, FeeConfig};
pub use finalize::finalize_output_proposals;
pub use ledger::{BlockMeta, ChunkData, ChunkTx, Ledger};
pub use mock_ledger::MockLedger;
pub use scan::{refresh, refresh_with_cancel, ScanConfig};
pub use select::{select_inputs, InputSelector, PseudoRandomSelector, TrivialSelector};
pub use store::{EnoteStore, OriginContext, OriginStatus, SpentContext, SpentStatus};
pub use validate::validate_transaction;
pub use version::make_version_string;
