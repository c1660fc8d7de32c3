//! Error types for core cryptographic operations.
//!
//! Errors are categorized by the operation that caused them. A "not mine"
//! scan verdict is never an error (scanning functions return `Option`),
//! so every variant here indicates malformed input, a protocol violation,
//! or a failed proof.

use core::fmt;

/// Result type alias for core cryptographic operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Error type for all core cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    // =========================================================================
    // Key / address errors
    // =========================================================================
    /// A scalar encoding was non-canonical or otherwise invalid.
    InvalidScalar(String),

    /// A point encoding failed to decompress or was not canonical.
    InvalidPoint(String),

    /// A point that must lie in the prime-order subgroup does not.
    NotInPrimeSubgroup(String),

    /// Address index exceeds the 56-bit range.
    AddressIndexOutOfRange(u64),

    /// An input had the wrong byte length.
    InvalidLength {
        /// Name of the offending field.
        field: String,
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    // =========================================================================
    // Enote / proposal errors
    // =========================================================================
    /// A payment or self-send proposal is internally inconsistent.
    InvalidProposal(String),

    /// Two self-sends of the same type share an ephemeral pubkey.
    SelfSendTypeCollision,

    /// An enote-view private key turned out to be zero (degenerate enote).
    DegenerateEnoteViewKey,

    // =========================================================================
    // Composition proof errors
    // =========================================================================
    /// Composition proof construction failed.
    CompositionProofFailed(String),

    /// Composition proof verification failed.
    CompositionProofInvalid,

    /// A multisig partial signature does not match its siblings.
    PartialSignatureMismatch(String),

    /// A multisig partial signature failed its per-signer check.
    PartialSignatureInvalid {
        /// 0-based index of the offending signer within the filter set.
        signer_slot: usize,
    },

    // =========================================================================
    // Membership proof errors
    // =========================================================================
    /// Bin configuration is unusable for the requested reference-set size.
    InvalidBinConfig(String),

    /// The ledger does not contain enough enotes for the reference set.
    RefSetTooLarge {
        /// Requested reference-set size.
        requested: u64,
        /// Enotes available on the ledger.
        available: u64,
    },

    /// Membership proof verification failed.
    MembershipProofInvalid,

    // =========================================================================
    // Balance / range errors
    // =========================================================================
    /// Commitments minus outputs minus fee is not the identity.
    BalanceMismatch,

    /// A range proof failed to verify.
    RangeProofInvalid {
        /// Index of the offending output.
        output_index: usize,
    },

    /// Input and output counts disagree with the proof counts.
    ProofCountMismatch {
        /// Expected count.
        expected: usize,
        /// Actual count.
        actual: usize,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidScalar(msg) => write!(f, "Invalid scalar: {msg}"),
            CoreError::InvalidPoint(msg) => write!(f, "Invalid point: {msg}"),
            CoreError::NotInPrimeSubgroup(msg) => {
                write!(f, "Point not in prime-order subgroup: {msg}")
            }
            CoreError::AddressIndexOutOfRange(j) => {
                write!(f, "Address index {j} exceeds 56-bit range")
            }
            CoreError::InvalidLength {
                field,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Invalid {field} length: expected {expected}, got {actual}"
                )
            }
            CoreError::InvalidProposal(msg) => write!(f, "Invalid proposal: {msg}"),
            CoreError::SelfSendTypeCollision => {
                write!(
                    f,
                    "Two self-sends of the same type share an ephemeral pubkey"
                )
            }
            CoreError::DegenerateEnoteViewKey => {
                write!(f, "Enote view private key is zero")
            }
            CoreError::CompositionProofFailed(msg) => {
                write!(f, "Composition proof construction failed: {msg}")
            }
            CoreError::CompositionProofInvalid => {
                write!(f, "Composition proof verification failed")
            }
            CoreError::PartialSignatureMismatch(msg) => {
                write!(f, "Partial signature set mismatch: {msg}")
            }
            CoreError::PartialSignatureInvalid { signer_slot } => {
                write!(f, "Partial signature from signer slot {signer_slot} is invalid")
            }
            CoreError::InvalidBinConfig(msg) => write!(f, "Invalid bin config: {msg}"),
            CoreError::RefSetTooLarge {
                requested,
                available,
            } => {
                write!(
                    f,
                    "Reference set of {requested} exceeds {available} ledger enotes"
                )
            }
            CoreError::MembershipProofInvalid => {
                write!(f, "Membership proof verification failed")
            }
            CoreError::BalanceMismatch => {
                write!(f, "Balance check failed: commitments do not sum to fee")
            }
            CoreError::RangeProofInvalid { output_index } => {
                write!(f, "Range proof for output {output_index} failed")
            }
            CoreError::ProofCountMismatch { expected, actual } => {
                write!(f, "Proof count mismatch: expected {expected}, got {actual}")
            }
        }
    }
}

impl std::error::Error for CoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidLength {
            field: "key_image".into(),
            expected: 32,
            actual: 31,
        };
        let msg = err.to_string();
        assert!(msg.contains("key_image"));
        assert!(msg.contains("32"));
        assert!(msg.contains("31"));
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(CoreError::BalanceMismatch, CoreError::BalanceMismatch);
        assert_ne!(
            CoreError::CompositionProofInvalid,
            CoreError::MembershipProofInvalid
        );
    }
}
