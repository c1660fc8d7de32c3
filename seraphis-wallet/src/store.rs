//! The enote store: owned outputs keyed by key image, with origin and
//! spent contexts.
//!
//! Context updates follow one rule: **older wins**. "Older" means higher
//! confidence first (on-chain > unconfirmed > off-chain), then smaller
//! block index, then smaller ledger index, then earlier timestamp. A
//! record's contexts only move toward older states during a scan; rolling
//! blocks back is the single operation that moves them the other way.

use std::collections::{BTreeMap, HashMap};

use seraphis_crypto_core::FullRecord;

/// Confidence level of an enote's origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OriginStatus {
    /// Known only from an off-chain source (e.g. a partial tx).
    Offchain,
    /// Seen in the mempool.
    Unconfirmed,
    /// Included in a confirmed block.
    Onchain,
}

/// Spend state of an owned enote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpentStatus {
    /// No spend observed.
    Unspent,
    /// Spent by an off-chain (not yet broadcast) transaction.
    SpentOffchain,
    /// Spent by a mempool transaction.
    SpentUnconfirmed,
    /// Spent in a confirmed block.
    SpentOnchain,
}

impl OriginStatus {
    fn confidence(self) -> u8 {
        match self {
            OriginStatus::Offchain => 0,
            OriginStatus::Unconfirmed => 1,
            OriginStatus::Onchain => 2,
        }
    }
}

impl SpentStatus {
    fn confidence(self) -> u8 {
        match self {
            SpentStatus::Unspent => 0,
            SpentStatus::SpentOffchain => 1,
            SpentStatus::SpentUnconfirmed => 2,
            SpentStatus::SpentOnchain => 3,
        }
    }
}

/// Where and when an enote appeared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OriginContext {
    /// Confidence level.
    pub status: OriginStatus,
    /// Containing block (meaningful for on-chain).
    pub block_index: u64,
    /// Containing block's timestamp.
    pub block_timestamp: u64,
    /// Id of the containing transaction.
    pub tx_id: [u8; 32],
    /// Position in the ledger's flat enote index space.
    pub ledger_index: u64,
}

/// Where and when an enote was spent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpentContext {
    /// Spend state.
    pub status: SpentStatus,
    /// Block of the spending tx (meaningful for spent-on-chain).
    pub block_index: u64,
    /// That block's timestamp.
    pub block_timestamp: u64,
}

impl SpentContext {
    /// An unspent context.
    #[must_use]
    pub fn unspent() -> Self {
        Self {
            status: SpentStatus::Unspent,
            block_index: 0,
            block_timestamp: 0,
        }
    }
}

impl OriginContext {
    /// Whether `self` is older (higher confidence) than `other`.
    #[must_use]
    pub fn is_older_than(&self, other: &OriginContext) -> bool {
        (
            self.status.confidence(),
            std::cmp::Reverse(self.block_index),
            std::cmp::Reverse(self.ledger_index),
            std::cmp::Reverse(self.block_timestamp),
        ) > (
            other.status.confidence(),
            std::cmp::Reverse(other.block_index),
            std::cmp::Reverse(other.ledger_index),
            std::cmp::Reverse(other.block_timestamp),
        )
    }
}

impl SpentContext {
    /// Whether `self` is older (higher confidence) than `other`.
    #[must_use]
    pub fn is_older_than(&self, other: &SpentContext) -> bool {
        (
            self.status.confidence(),
            std::cmp::Reverse(self.block_index),
            std::cmp::Reverse(self.block_timestamp),
        ) > (
            other.status.confidence(),
            std::cmp::Reverse(other.block_index),
            std::cmp::Reverse(other.block_timestamp),
        )
    }
}

/// A stored owned enote with its contexts.
#[derive(Clone, Debug)]
pub struct StoredEnote {
    /// The recovered full record.
    pub record: FullRecord,
    /// Origin context.
    pub origin: OriginContext,
    /// Spent context.
    pub spent: SpentContext,
}

/// Owned-enote store for one wallet.
#[derive(Clone, Debug, Default)]
pub struct EnoteStore {
    /// Records keyed by compressed key image.
    records: HashMap<[u8; 32], StoredEnote>,
    /// Block ids of scanned blocks, for local reorg detection.
    scanned_block_ids: BTreeMap<u64, [u8; 32]>,
    /// Wallet birth height; scanning never goes below this.
    refresh_start_height: u64,
    /// First unscanned block height.
    next_scan_height: u64,
}

impl EnoteStore {
    /// New store with the given birth height.
    #[must_use]
    pub fn new(refresh_start_height: u64) -> Self {
        Self {
            refresh_start_height,
            next_scan_height: refresh_start_height,
            ..Self::default()
        }
    }

    /// Wallet birth height.
    #[must_use]
    pub fn refresh_start_height(&self) -> u64 {
        self.refresh_start_height
    }

    /// First block height not yet scanned.
    #[must_use]
    pub fn next_scan_height(&self) -> u64 {
        self.next_scan_height
    }

    /// Block id recorded for `height`, if scanned.
    #[must_use]
    pub fn scanned_block_id(&self, height: u64) -> Option<[u8; 32]> {
        self.scanned_block_ids.get(&height).copied()
    }

    /// Record that `height` was scanned with the given id.
    pub fn note_scanned_block(&mut self, height: u64, block_id: [u8; 32]) {
        self.scanned_block_ids.insert(height, block_id);
        self.next_scan_height = self.next_scan_height.max(height + 1);
    }

    /// Whether a record exists for this key image.
    #[must_use]
    pub fn has_enote_with_key_image(&self, key_image: &[u8; 32]) -> bool {
        self.records.contains_key(key_image)
    }

    /// Look up a stored enote by key image.
    #[must_use]
    pub fn get(&self, key_image: &[u8; 32]) -> Option<&StoredEnote> {
        self.records.get(key_image)
    }

    /// Iterate all stored enotes.
    pub fn iter(&self) -> impl Iterator<Item = &StoredEnote> {
        self.records.values()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert a record, or refresh an existing one's origin context.
    /// The older origin context wins; the record payload is kept from the
    /// first insertion (it is identical by construction).
    pub fn add_record(&mut self, record: FullRecord, origin: OriginContext) {
        let key = record.key_image.compress().to_bytes();
        match self.records.get_mut(&key) {
            Some(existing) => {
                if origin.is_older_than(&existing.origin) {
                    existing.origin = origin;
                }
            }
            None => {
                self.records.insert(
                    key,
                    StoredEnote {
                        record,
                        origin,
                        spent: SpentContext::unspent(),
                    },
                );
            }
        }
    }

    /// Apply an origin context if older than the stored one.
    pub fn update_origin_context(&mut self, key_image: &[u8; 32], origin: OriginContext) {
        if let Some(stored) = self.records.get_mut(key_image) {
            if origin.is_older_than(&stored.origin) {
                stored.origin = origin;
            }
        }
    }

    /// Apply a spent context if older than the stored one.
    pub fn update_spent_context(&mut self, key_image: &[u8; 32], spent: SpentContext) {
        if let Some(stored) = self.records.get_mut(key_image) {
            if spent.is_older_than(&stored.spent) {
                stored.spent = spent;
            }
        }
    }

    /// Remove all unconfirmed state ahead of a fresh mempool snapshot:
    /// unconfirmed-origin records are dropped and unconfirmed spent
    /// contexts cleared.
    pub fn clear_unconfirmed(&mut self) {
        self.records
            .retain(|_, stored| stored.origin.status != OriginStatus::Unconfirmed);
        for stored in self.records.values_mut() {
            if stored.spent.status == SpentStatus::SpentUnconfirmed {
                stored.spent = SpentContext::unspent();
            }
        }
    }

    /// Discard all scanned on-chain state at heights `>= start`. Records
    /// originating there are removed; spends recorded there are cleared
    /// (the spent enote itself survives).
    pub fn rollback_from(&mut self, start: u64) {
        self.records.retain(|_, stored| {
            !(stored.origin.status == OriginStatus::Onchain
                && stored.origin.block_index >= start)
        });
        for stored in self.records.values_mut() {
            if stored.spent.status == SpentStatus::SpentOnchain
                && stored.spent.block_index >= start
            {
                stored.spent = SpentContext::unspent();
            }
        }
        self.scanned_block_ids.retain(|height, _| *height < start);
        self.next_scan_height = self
            .scanned_block_ids
            .keys()
            .next_back()
            .map_or(self.refresh_start_height, |top| top + 1);
    }

    /// Roll back the top `count` scanned blocks.
    pub fn pop_blocks(&mut self, count: u64) {
        self.rollback_from(self.next_scan_height.saturating_sub(count));
    }

    /// Sum of amounts of records whose origin status is in `origins` and
    /// whose spent status is NOT in `exclude_spent`.
    #[must_use]
    pub fn get_balance(
        &self,
        origins: &[OriginStatus],
        exclude_spent: &[SpentStatus],
    ) -> u64 {
        self.records
            .values()
            .filter(|stored| origins.contains(&stored.origin.status))
            .filter(|stored| !exclude_spent.contains(&stored.spent.status))
            .map(|stored| stored.record.amount)
            .sum()
    }

    /// Confirmed balance: on-chain origin, not spent on-chain.
    #[must_use]
    pub fn onchain_balance(&self) -> u64 {
        self.get_balance(&[OriginStatus::Onchain], &[SpentStatus::SpentOnchain])
    }

    /// Combined balance: on-chain or unconfirmed origin, excluding
    /// anything spent on-chain or in the mempool.
    #[must_use]
    pub fn combined_balance(&self) -> u64 {
        self.get_balance(
            &[OriginStatus::Onchain, OriginStatus::Unconfirmed],
            &[SpentStatus::SpentOnchain, SpentStatus::SpentUnconfirmed],
        )
    }

    /// Unconfirmed incoming balance.
    #[must_use]
    pub fn unconfirmed_balance(&self) -> u64 {
        self.get_balance(
            &[OriginStatus::Unconfirmed],
            &[SpentStatus::SpentOnchain, SpentStatus::SpentUnconfirmed],
        )
    }

    /// Records spendable right now: on-chain origin, fully unspent.
    #[must_use]
    pub fn spendable_records(&self) -> Vec<FullRecord> {
        self.records
            .values()
            .filter(|stored| {
                stored.origin.status == OriginStatus::Onchain
                    && stored.spent.status == SpentStatus::Unspent
            })
            .map(|stored| stored.record.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use seraphis_crypto_core::{
        make_destination, try_full_record, PaymentProposal, WalletKeys,
    };

    fn record_for(keys: &WalletKeys, amount: u64) -> FullRecord {
        let dest = make_destination(&keys.view_balance.address_keys(), 0).unwrap();
        let output = PaymentProposal::new(dest, amount, &mut OsRng)
            .output_proposal()
            .unwrap();
        try_full_record(
            &output.enote,
            &output.enote_ephemeral_pubkey,
            &keys.view_balance,
        )
        .unwrap()
    }

    fn onchain_origin(block: u64, ledger_index: u64) -> OriginContext {
        OriginContext {
            status: OriginStatus::Onchain,
            block_index: block,
            block_timestamp: block * 60,
            tx_id: [0u8; 32],
            ledger_index,
        }
    }

    #[test]
    fn test_one_record_per_key_image() {
        let keys = WalletKeys::generate(&mut OsRng);
        let record = record_for(&keys, 10);
        let mut store = EnoteStore::new(0);

        store.add_record(record.clone(), onchain_origin(5, 0));
        store.add_record(record, onchain_origin(6, 1));
        assert_eq!(store.len(), 1);
        // The older (smaller block) origin wins.
        assert_eq!(store.iter().next().unwrap().origin.block_index, 5);
    }

    #[test]
    fn test_spent_context_upgrades_monotonically() {
        let keys = WalletKeys::generate(&mut OsRng);
        let record = record_for(&keys, 10);
        let ki = record.key_image.compress().to_bytes();
        let mut store = EnoteStore::new(0);
        store.add_record(record, onchain_origin(1, 0));

        store.update_spent_context(
            &ki,
            SpentContext {
                status: SpentStatus::SpentUnconfirmed,
                block_index: 0,
                block_timestamp: 0,
            },
        );
        store.update_spent_context(
            &ki,
            SpentContext {
                status: SpentStatus::SpentOnchain,
                block_index: 9,
                block_timestamp: 540,
            },
        );
        assert_eq!(store.get(&ki).unwrap().spent.status, SpentStatus::SpentOnchain);

        // A later, less confident update does not downgrade.
        store.update_spent_context(
            &ki,
            SpentContext {
                status: SpentStatus::SpentUnconfirmed,
                block_index: 0,
                block_timestamp: 0,
            },
        );
        assert_eq!(store.get(&ki).unwrap().spent.status, SpentStatus::SpentOnchain);
    }

    #[test]
    fn test_rollback_removes_origins_and_clears_spends() {
        let keys = WalletKeys::generate(&mut OsRng);
        let kept = record_for(&keys, 7);
        let dropped = record_for(&keys, 3);
        let kept_ki = kept.key_image.compress().to_bytes();

        let mut store = EnoteStore::new(0);
        store.add_record(kept, onchain_origin(1, 0));
        store.add_record(dropped, onchain_origin(5, 1));
        store.update_spent_context(
            &kept_ki,
            SpentContext {
                status: SpentStatus::SpentOnchain,
                block_index: 5,
                block_timestamp: 300,
            },
        );
        for height in 0..6 {
            store.note_scanned_block(height, [height as u8; 32]);
        }

        store.rollback_from(4);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&kept_ki).unwrap().spent.status, SpentStatus::Unspent);
        assert_eq!(store.next_scan_height(), 4);
    }

    #[test]
    fn test_balance_filters() {
        let keys = WalletKeys::generate(&mut OsRng);
        let a = record_for(&keys, 100);
        let b = record_for(&keys, 40);
        let b_ki = b.key_image.compress().to_bytes();

        let mut store = EnoteStore::new(0);
        store.add_record(a, onchain_origin(1, 0));
        store.add_record(b, onchain_origin(2, 1));
        store.update_spent_context(
            &b_ki,
            SpentContext {
                status: SpentStatus::SpentUnconfirmed,
                block_index: 0,
                block_timestamp: 0,
            },
        );

        assert_eq!(store.onchain_balance(), 140);
        assert_eq!(store.combined_balance(), 100);
        assert_eq!(store.unconfirmed_balance(), 0);
    }
}
