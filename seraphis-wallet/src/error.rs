//! Wallet-layer error types.

use seraphis_crypto_core::CoreError;
use thiserror::Error;

/// Result type alias for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;

/// Error type for scanning, building, validating, and multisig signing.
#[derive(Debug, Error)]
pub enum WalletError {
    /// A crypto-core operation failed.
    #[error("crypto core: {0}")]
    Core(#[from] CoreError),

    /// Input selection could not cover the requested total.
    #[error("insufficient funds: need {needed}, available {available}")]
    InsufficientFunds {
        /// Output total plus fee.
        needed: u64,
        /// Sum of selectable enotes.
        available: u64,
    },

    /// Input selection exceeded the input-count cap.
    #[error("too many inputs: {count} exceeds maximum {max}")]
    TooManyInputs {
        /// Inputs the selection would need.
        count: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The output set violates the finalization rules.
    #[error("output set: {0}")]
    OutputSet(String),

    /// A chunk fetch failed; the refresh loop retries these.
    #[error("chunk fetch: {0}")]
    ChunkFetch(String),

    /// Scanning gave up after exhausting its rescan budget.
    #[error("scan failed: {0}")]
    ScanFailed(String),

    /// The refresh was cancelled at a chunk boundary.
    #[error("scan cancelled")]
    Cancelled,

    /// Transaction validation failed.
    #[error("invalid transaction: {0}")]
    TxInvalid(String),

    /// A linking tag already exists on the ledger.
    #[error("double spend: key image already on ledger")]
    DoubleSpend,

    /// Multisig account or protocol violation.
    #[error("multisig: {0}")]
    Multisig(String),

    /// A nonce was requested twice for one signing context.
    #[error("nonce already recorded for this (message, key, filter)")]
    NonceReuse,

    /// No threshold subset has a complete partial-signature set.
    #[error("insufficient partial signatures; viable signer subsets: {viable:?}")]
    InsufficientPartialSigs {
        /// Filters for which every requested signer could still deliver.
        viable: Vec<u32>,
    },

    /// A partial signature failed verification, attributably.
    #[error("bad partial signature from signer {signer}")]
    BadPartialSignature {
        /// Index of the offending signer in the ordered signer set.
        signer: usize,
    },

    /// An amount string could not be parsed.
    #[error("malformed amount: {0}")]
    MalformedAmount(String),
}
