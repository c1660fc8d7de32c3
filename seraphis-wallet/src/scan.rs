//! The reorg-safe refresh algorithm.
//!
//! One refresh is: an on-chain pass, a mempool pass, then a follow-up
//! on-chain pass (to catch a block mined between the first two). A chunk
//! whose metadata does not continue the scanner's view of the chain
//! signals a likely reorg; the scanner retries from
//! `next_scan_height − reorg_avoidance_depth` up to a budget, then falls
//! back to one full rescan from the wallet birth height, and only then
//! fails. Transient chunk-fetch failures draw on the same budget instead
//! of aborting the refresh.
//!
//! The whole algorithm is a pure function of `(ledger, store, config)`:
//! no worker-thread orchestration lives here. Each on-chain pass first
//! rolls the store back to its start height, so re-running a pass is
//! idempotent, and a chunk is applied to the store atomically before the
//! next is fetched. Cancellation is cooperative and takes effect at
//! chunk boundaries.

use tracing::{debug, info, warn};

use seraphis_crypto_core::keys::hierarchy::ViewBalanceKeys;
use seraphis_crypto_core::try_full_record;

use crate::error::{WalletError, WalletResult};
use crate::ledger::{ChunkData, Ledger};
use crate::store::{EnoteStore, OriginContext, OriginStatus, SpentContext, SpentStatus};

/// Refresh parameters.
#[derive(Clone, Copy, Debug)]
pub struct ScanConfig {
    /// How far below the scanned tip each refresh restarts, to absorb
    /// small reorgs without a discontinuity signal.
    pub reorg_avoidance_depth: u64,
    /// Maximum blocks per chunk request.
    pub max_chunk_size: u64,
    /// Partial-rescan attempts before escalating to a full rescan.
    pub max_partialscan_attempts: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            reorg_avoidance_depth: 3,
            max_chunk_size: 100,
            max_partialscan_attempts: 3,
        }
    }
}

enum PassOutcome {
    /// Caught up with the chain tip.
    Done,
    /// Chunk metadata did not continue the scanned chain.
    Reorg,
}

/// Run one refresh to the chain tip.
///
/// # Errors
/// `ChunkFetch` failures consume rescan attempts like discontinuities do
/// and surface only once the budget (including the full-rescan fallback)
/// is exhausted; `ScanFailed` when the chain view itself never settles.
pub fn refresh(
    ledger: &impl Ledger,
    view_balance: &ViewBalanceKeys,
    store: &mut EnoteStore,
    config: &ScanConfig,
) -> WalletResult<()> {
    refresh_with_cancel(ledger, view_balance, store, config, &|| false)
}

/// [`refresh`] with a cooperative cancellation hook, polled at every
/// chunk boundary.
///
/// # Errors
/// As [`refresh`], plus `Cancelled`.
pub fn refresh_with_cancel(
    ledger: &impl Ledger,
    view_balance: &ViewBalanceKeys,
    store: &mut EnoteStore,
    config: &ScanConfig,
    cancelled: &impl Fn() -> bool,
) -> WalletResult<()> {
    let mut attempts = 0u32;
    let mut start = store
        .next_scan_height()
        .saturating_sub(config.reorg_avoidance_depth)
        .max(store.refresh_start_height());

    loop {
        let outcome = run_passes(ledger, view_balance, store, config, start, cancelled);

        // A transient fetch failure spends a rescan attempt the same way
        // a chunk discontinuity does.
        let fetch_failure = match outcome {
            Ok(PassOutcome::Done) => {
                info!(
                    top = store.next_scan_height(),
                    records = store.len(),
                    "refresh complete"
                );
                return Ok(());
            }
            Ok(PassOutcome::Reorg) => None,
            Err(WalletError::ChunkFetch(reason)) => Some(reason),
            Err(other) => return Err(other),
        };

        attempts += 1;
        if attempts <= config.max_partialscan_attempts {
            start = store
                .next_scan_height()
                .saturating_sub(config.reorg_avoidance_depth)
                .max(store.refresh_start_height());
            match &fetch_failure {
                Some(reason) => {
                    warn!(attempt = attempts, start, reason = %reason, "chunk fetch failed; partial rescan");
                }
                None => warn!(attempt = attempts, start, "chunk discontinuity; partial rescan"),
            }
        } else if attempts == config.max_partialscan_attempts + 1 {
            start = store.refresh_start_height();
            warn!(start, "partial-rescan budget exhausted; full rescan");
        } else {
            return Err(match fetch_failure {
                Some(reason) => WalletError::ChunkFetch(reason),
                None => WalletError::ScanFailed(
                    "chain view still inconsistent after full rescan".into(),
                ),
            });
        }
    }
}

/// One full scan cycle: on-chain to tip, mempool, then a follow-up
/// on-chain pass to catch a block mined while reading the mempool.
fn run_passes(
    ledger: &impl Ledger,
    view_balance: &ViewBalanceKeys,
    store: &mut EnoteStore,
    config: &ScanConfig,
    start: u64,
    cancelled: &impl Fn() -> bool,
) -> WalletResult<PassOutcome> {
    let outcome = onchain_pass(ledger, view_balance, store, config, start, cancelled)?;
    if matches!(outcome, PassOutcome::Reorg) {
        return Ok(outcome);
    }
    unconfirmed_pass(ledger, view_balance, store)?;
    // No rewind for the follow-up; resume from the scanned tip.
    onchain_pass(
        ledger,
        view_balance,
        store,
        config,
        store.next_scan_height(),
        cancelled,
    )
}

fn onchain_pass(
    ledger: &impl Ledger,
    view_balance: &ViewBalanceKeys,
    store: &mut EnoteStore,
    config: &ScanConfig,
    start: u64,
    cancelled: &impl Fn() -> bool,
) -> WalletResult<PassOutcome> {
    store.rollback_from(start);
    let mut height = start;

    loop {
        if cancelled() {
            return Err(WalletError::Cancelled);
        }

        let chunk = ledger.try_get_onchain_chunk(height, config.max_chunk_size)?;
        if chunk.blocks.is_empty() {
            return Ok(tip_consistency(ledger, store));
        }

        // Contiguity: heights in order, ids chained, first block continues
        // the scanned chain.
        if chunk.start_height != height {
            return Ok(PassOutcome::Reorg);
        }
        let mut prev_id = if height == 0 {
            None
        } else {
            store.scanned_block_id(height - 1)
        };
        for (offset, block) in chunk.blocks.iter().enumerate() {
            if block.block_index != height + offset as u64 {
                return Ok(PassOutcome::Reorg);
            }
            if let Some(expected) = prev_id {
                if block.prev_block_id != expected {
                    debug!(height = block.block_index, "previous-block id mismatch");
                    return Ok(PassOutcome::Reorg);
                }
            }
            prev_id = Some(block.block_id);
        }

        apply_onchain_chunk(&chunk, view_balance, store);
        height += chunk.blocks.len() as u64;
    }
}

/// Compare the scanned tip against the ledger's after an empty chunk.
fn tip_consistency(ledger: &impl Ledger, store: &EnoteStore) -> PassOutcome {
    match ledger.top_block_id() {
        Some((tip_height, tip_id)) => {
            if store.next_scan_height() > tip_height + 1 {
                return PassOutcome::Reorg;
            }
            if store.next_scan_height() == tip_height + 1
                && store.scanned_block_id(tip_height) != Some(tip_id)
            {
                return PassOutcome::Reorg;
            }
            PassOutcome::Done
        }
        None => {
            if store.next_scan_height() > store.refresh_start_height() {
                PassOutcome::Reorg
            } else {
                PassOutcome::Done
            }
        }
    }
}

fn apply_onchain_chunk(
    chunk: &ChunkData,
    view_balance: &ViewBalanceKeys,
    store: &mut EnoteStore,
) {
    // Records first, then key images, so a tx spending our enote while
    // creating our change sees both sides within one chunk.
    for tx in &chunk.txs {
        let Some(block_index) = tx.block_index else { continue };
        let timestamp = chunk
            .blocks
            .iter()
            .find(|block| block.block_index == block_index)
            .map_or(0, |block| block.timestamp);

        for (enote, ephemeral_pubkey, ledger_index) in &tx.enotes {
            if let Some(record) = try_full_record(enote, ephemeral_pubkey, view_balance) {
                debug!(
                    block = block_index,
                    amount = record.amount,
                    tx = %hex::encode(tx.tx_id),
                    "owned enote found"
                );
                store.add_record(
                    record,
                    OriginContext {
                        status: OriginStatus::Onchain,
                        block_index,
                        block_timestamp: timestamp,
                        tx_id: tx.tx_id,
                        ledger_index: *ledger_index,
                    },
                );
            }
        }
    }

    for tx in &chunk.txs {
        let Some(block_index) = tx.block_index else { continue };
        let timestamp = chunk
            .blocks
            .iter()
            .find(|block| block.block_index == block_index)
            .map_or(0, |block| block.timestamp);
        for key_image in &tx.key_images {
            let key = key_image.compress().to_bytes();
            if store.has_enote_with_key_image(&key) {
                store.update_spent_context(
                    &key,
                    SpentContext {
                        status: SpentStatus::SpentOnchain,
                        block_index,
                        block_timestamp: timestamp,
                    },
                );
            }
        }
    }

    for block in &chunk.blocks {
        store.note_scanned_block(block.block_index, block.block_id);
    }
}

fn unconfirmed_pass(
    ledger: &impl Ledger,
    view_balance: &ViewBalanceKeys,
    store: &mut EnoteStore,
) -> WalletResult<()> {
    store.clear_unconfirmed();
    let chunk = ledger.try_get_unconfirmed_chunk()?;

    for tx in &chunk.txs {
        for (enote, ephemeral_pubkey, _) in &tx.enotes {
            if let Some(record) = try_full_record(enote, ephemeral_pubkey, view_balance) {
                store.add_record(
                    record,
                    OriginContext {
                        status: OriginStatus::Unconfirmed,
                        block_index: 0,
                        block_timestamp: 0,
                        tx_id: tx.tx_id,
                        ledger_index: 0,
                    },
                );
            }
        }
    }
    for tx in &chunk.txs {
        for key_image in &tx.key_images {
            let key = key_image.compress().to_bytes();
            if store.has_enote_with_key_image(&key) {
                store.update_spent_context(
                    &key,
                    SpentContext {
                        status: SpentStatus::SpentUnconfirmed,
                        block_index: 0,
                        block_timestamp: 0,
                    },
                );
            }
        }
    }
    Ok(())
}
