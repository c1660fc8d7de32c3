//! The ledger abstraction consumed by the scanner and the builder.
//!
//! A ledger delivers **chunks**: bounded, contiguous slices of blocks (or
//! a mempool snapshot) carrying per-block metadata, the enotes of each
//! transaction, and every key image seen. The metadata (block id and
//! previous-block id) is what lets the scanner detect reorgs locally
//! without trusting the daemon.

use curve25519_dalek::edwards::EdwardsPoint;
use seraphis_crypto_core::Enote;

use crate::error::WalletResult;

/// Per-block metadata inside a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockMeta {
    /// Block height.
    pub block_index: u64,
    /// Block id.
    pub block_id: [u8; 32],
    /// Parent block id.
    pub prev_block_id: [u8; 32],
    /// Block timestamp.
    pub timestamp: u64,
}

/// One transaction's scanner-relevant content.
#[derive(Clone, Debug)]
pub struct ChunkTx {
    /// Transaction id.
    pub tx_id: [u8; 32],
    /// Containing block height; `None` in a mempool chunk.
    pub block_index: Option<u64>,
    /// Output enotes with their ephemeral pubkeys and flat ledger indices
    /// (the index is meaningless until the tx is mined).
    pub enotes: Vec<(Enote, EdwardsPoint, u64)>,
    /// Key images of the transaction's inputs.
    pub key_images: Vec<EdwardsPoint>,
}

/// A contiguous slice of ledger state.
#[derive(Clone, Debug, Default)]
pub struct ChunkData {
    /// First block height covered; irrelevant for mempool chunks.
    pub start_height: u64,
    /// Covered blocks in height order; empty means "caller is at tip".
    pub blocks: Vec<BlockMeta>,
    /// Transactions in the covered range.
    pub txs: Vec<ChunkTx>,
}

/// Read interface the scan and builder engines depend on.
pub trait Ledger {
    /// Blocks `[start, start + n)` with `n <= max_size`; an empty block
    /// list means the caller is at the tip.
    fn try_get_onchain_chunk(&self, start: u64, max_size: u64) -> WalletResult<ChunkData>;

    /// A mempool snapshot; may be empty.
    fn try_get_unconfirmed_chunk(&self) -> WalletResult<ChunkData>;

    /// Whether a key image is already spent (on-chain or in the mempool).
    fn key_image_exists(&self, key_image: &EdwardsPoint) -> bool;

    /// Size of the flat on-chain enote index space.
    fn num_enotes(&self) -> u64;

    /// The enote at a flat index, as reference-set material
    /// `(one-time address, amount commitment)`.
    fn enote_at(&self, index: u64) -> Option<(EdwardsPoint, EdwardsPoint)>;

    /// Current chain height (number of blocks).
    fn chain_height(&self) -> u64;

    /// Height and id of the tip block, `None` on an empty chain. Lets a
    /// scanner that received an empty chunk confirm its view of the tip.
    fn top_block_id(&self) -> Option<(u64, [u8; 32])>;
}
