//! In-memory reference ledger used by the scenario tests.
//!
//! Matches the contract real ledgers must honor: chunks are contiguous
//! and bounded, block metadata is sufficient for local reorg detection,
//! and `pop_blocks` reorganizes the chain the way a daemon would report
//! it. Shared-mutable state sits behind a single reader/writer lock.

use std::collections::HashSet;

use curve25519_dalek::edwards::EdwardsPoint;
use parking_lot::RwLock;
use seraphis_crypto_core::Enote;
use sha3::{Digest, Keccak256};

use crate::builder::Transaction;
use crate::error::WalletResult;
use crate::ledger::{BlockMeta, ChunkData, ChunkTx, Ledger};

struct MockBlock {
    meta: BlockMeta,
    txs: Vec<ChunkTx>,
}

#[derive(Default)]
struct MockState {
    blocks: Vec<MockBlock>,
    // Flat (Ko, C) index space for reference sets.
    flat_enotes: Vec<(EdwardsPoint, EdwardsPoint)>,
    onchain_key_images: HashSet<[u8; 32]>,
    unconfirmed_txs: Vec<ChunkTx>,
    unconfirmed_key_images: HashSet<[u8; 32]>,
    tx_counter: u64,
}

/// Shared in-memory ledger.
#[derive(Default)]
pub struct MockLedger {
    state: RwLock<MockState>,
}

fn make_block_id(height: u64, prev: &[u8; 32], txs: &[ChunkTx]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(b"mock_block_id");
    hasher.update(height.to_le_bytes());
    hasher.update(prev);
    for tx in txs {
        hasher.update(tx.tx_id);
    }
    hasher.finalize().into()
}

impl MockState {
    fn next_tx_id(&mut self) -> [u8; 32] {
        self.tx_counter += 1;
        let mut hasher = Keccak256::new();
        hasher.update(b"mock_tx_id");
        hasher.update(self.tx_counter.to_le_bytes());
        hasher.finalize().into()
    }

    fn commit_block(&mut self, mut txs: Vec<ChunkTx>) -> u64 {
        let height = self.blocks.len() as u64;
        let prev = self
            .blocks
            .last()
            .map_or([0u8; 32], |block| block.meta.block_id);

        for tx in &mut txs {
            tx.block_index = Some(height);
            for (enote, _, ledger_index) in &mut tx.enotes {
                *ledger_index = self.flat_enotes.len() as u64;
                self.flat_enotes
                    .push((enote.onetime_address, enote.amount_commitment));
            }
            for key_image in &tx.key_images {
                self.onchain_key_images
                    .insert(key_image.compress().to_bytes());
            }
        }

        let meta = BlockMeta {
            block_index: height,
            block_id: make_block_id(height, &prev, &txs),
            prev_block_id: prev,
            timestamp: 1_700_000_000 + height * 120,
        };
        self.blocks.push(MockBlock { meta, txs });
        height
    }
}

impl MockLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mine a block containing a single coinbase transaction with the
    /// given outputs. Returns the block height.
    pub fn add_coinbase_block(&self, outputs: Vec<(Enote, EdwardsPoint)>) -> u64 {
        let mut state = self.state.write();
        let tx = ChunkTx {
            tx_id: state.next_tx_id(),
            block_index: None,
            enotes: outputs
                .into_iter()
                .map(|(enote, ephemeral)| (enote, ephemeral, 0))
                .collect(),
            key_images: Vec::new(),
        };
        state.commit_block(vec![tx])
    }

    /// Place a transaction in the mempool. Its key images are considered
    /// spent immediately for double-spend queries.
    pub fn submit_tx(&self, tx: &Transaction) -> WalletResult<()> {
        let mut state = self.state.write();
        let enotes = tx
            .outputs
            .iter()
            .enumerate()
            .map(|(index, enote)| (enote.clone(), tx.ephemeral_pubkey_for_output(index), 0))
            .collect();
        let key_images: Vec<EdwardsPoint> = tx.key_images().collect();
        for key_image in &key_images {
            state
                .unconfirmed_key_images
                .insert(key_image.compress().to_bytes());
        }
        let chunk_tx = ChunkTx {
            tx_id: state.next_tx_id(),
            block_index: None,
            enotes,
            key_images,
        };
        state.unconfirmed_txs.push(chunk_tx);
        Ok(())
    }

    /// Mine the current mempool into one block. Returns the block height.
    pub fn commit_unconfirmed(&self) -> u64 {
        let mut state = self.state.write();
        let txs = std::mem::take(&mut state.unconfirmed_txs);
        state.unconfirmed_key_images.clear();
        state.commit_block(txs)
    }

    /// Pop the top `count` blocks (reorg). Their enotes leave the flat
    /// index space and their key images become unspent.
    pub fn pop_blocks(&self, count: u64) {
        let mut state = self.state.write();
        for _ in 0..count {
            let Some(block) = state.blocks.pop() else { break };
            for tx in &block.txs {
                for _ in &tx.enotes {
                    state.flat_enotes.pop();
                }
                for key_image in &tx.key_images {
                    state
                        .onchain_key_images
                        .remove(&key_image.compress().to_bytes());
                }
            }
        }
    }
}

impl Ledger for MockLedger {
    fn try_get_onchain_chunk(&self, start: u64, max_size: u64) -> WalletResult<ChunkData> {
        let state = self.state.read();
        let height = state.blocks.len() as u64;
        if start >= height || max_size == 0 {
            return Ok(ChunkData {
                start_height: start,
                ..ChunkData::default()
            });
        }
        let end = height.min(start + max_size);
        let blocks = state.blocks[start as usize..end as usize]
            .iter()
            .map(|block| block.meta)
            .collect();
        let txs = state.blocks[start as usize..end as usize]
            .iter()
            .flat_map(|block| block.txs.iter().cloned())
            .collect();
        Ok(ChunkData {
            start_height: start,
            blocks,
            txs,
        })
    }

    fn try_get_unconfirmed_chunk(&self) -> WalletResult<ChunkData> {
        let state = self.state.read();
        Ok(ChunkData {
            start_height: 0,
            blocks: Vec::new(),
            txs: state.unconfirmed_txs.clone(),
        })
    }

    fn key_image_exists(&self, key_image: &EdwardsPoint) -> bool {
        let bytes = key_image.compress().to_bytes();
        let state = self.state.read();
        state.onchain_key_images.contains(&bytes)
            || state.unconfirmed_key_images.contains(&bytes)
    }

    fn num_enotes(&self) -> u64 {
        self.state.read().flat_enotes.len() as u64
    }

    fn enote_at(&self, index: u64) -> Option<(EdwardsPoint, EdwardsPoint)> {
        self.state.read().flat_enotes.get(index as usize).copied()
    }

    fn chain_height(&self) -> u64 {
        self.state.read().blocks.len() as u64
    }

    fn top_block_id(&self) -> Option<(u64, [u8; 32])> {
        let state = self.state.read();
        state
            .blocks
            .last()
            .map(|block| (block.meta.block_index, block.meta.block_id))
    }
}
