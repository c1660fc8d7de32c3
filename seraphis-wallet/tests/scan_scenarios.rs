//! End-to-end scanning scenarios against the mock ledger, including
//! mid-scan reorgs injected through adversarial ledger wrappers.

use std::cell::{Cell, RefCell};

use curve25519_dalek::edwards::EdwardsPoint;
use rand::rngs::OsRng;

use seraphis_crypto_core::{make_destination, Destination, Enote, PaymentProposal, WalletKeys};
use seraphis_wallet::{
    refresh, ChunkData, EnoteStore, Ledger, MockLedger, ScanConfig, WalletError, WalletResult,
};

fn wallet() -> (WalletKeys, Destination) {
    let keys = WalletKeys::generate(&mut OsRng);
    let dest = make_destination(&keys.view_balance.address_keys(), 0).unwrap();
    (keys, dest)
}

fn enote_to(dest: &Destination, amount: u64) -> (Enote, EdwardsPoint) {
    let output = PaymentProposal::new(dest.clone(), amount, &mut OsRng)
        .output_proposal()
        .unwrap();
    (output.enote, output.enote_ephemeral_pubkey)
}

// =============================================================================
// Adversarial ledger wrappers
// =============================================================================

/// Pops and replaces blocks once, just before the `trigger_at`-th on-chain
/// chunk fetch. Records the smallest start height requested afterwards so
/// tests can tell a partial rescan from a full one.
struct OneShotReorgLedger<'a> {
    inner: &'a MockLedger,
    trigger_at: u32,
    pop: u64,
    replacement: RefCell<Vec<Vec<(Enote, EdwardsPoint)>>>,
    fetches: Cell<u32>,
    triggered: Cell<bool>,
    min_start_after: Cell<Option<u64>>,
}

impl<'a> OneShotReorgLedger<'a> {
    fn new(
        inner: &'a MockLedger,
        trigger_at: u32,
        pop: u64,
        replacement: Vec<Vec<(Enote, EdwardsPoint)>>,
    ) -> Self {
        Self {
            inner,
            trigger_at,
            pop,
            replacement: RefCell::new(replacement),
            fetches: Cell::new(0),
            triggered: Cell::new(false),
            min_start_after: Cell::new(None),
        }
    }
}

impl Ledger for OneShotReorgLedger<'_> {
    fn try_get_onchain_chunk(&self, start: u64, max_size: u64) -> WalletResult<ChunkData> {
        let count = self.fetches.get() + 1;
        self.fetches.set(count);
        if count == self.trigger_at && !self.triggered.get() {
            self.triggered.set(true);
            self.inner.pop_blocks(self.pop);
            for outputs in self.replacement.borrow_mut().drain(..) {
                self.inner.add_coinbase_block(outputs);
            }
        } else if self.triggered.get() {
            let seen = self.min_start_after.get().map_or(start, |s| s.min(start));
            self.min_start_after.set(Some(seen));
        }
        self.inner.try_get_onchain_chunk(start, max_size)
    }

    fn try_get_unconfirmed_chunk(&self) -> WalletResult<ChunkData> {
        self.inner.try_get_unconfirmed_chunk()
    }

    fn key_image_exists(&self, key_image: &EdwardsPoint) -> bool {
        self.inner.key_image_exists(key_image)
    }

    fn num_enotes(&self) -> u64 {
        self.inner.num_enotes()
    }

    fn enote_at(&self, index: u64) -> Option<(EdwardsPoint, EdwardsPoint)> {
        self.inner.enote_at(index)
    }

    fn chain_height(&self) -> u64 {
        self.inner.chain_height()
    }

    fn top_block_id(&self) -> Option<(u64, [u8; 32])> {
        self.inner.top_block_id()
    }
}

/// Fails the first `failures` on-chain chunk fetches with a transient
/// error, then delegates.
struct FlakyLedger<'a> {
    inner: &'a MockLedger,
    failures: Cell<u32>,
}

impl Ledger for FlakyLedger<'_> {
    fn try_get_onchain_chunk(&self, start: u64, max_size: u64) -> WalletResult<ChunkData> {
        if self.failures.get() > 0 {
            self.failures.set(self.failures.get() - 1);
            return Err(WalletError::ChunkFetch("transient timeout".into()));
        }
        self.inner.try_get_onchain_chunk(start, max_size)
    }

    fn try_get_unconfirmed_chunk(&self) -> WalletResult<ChunkData> {
        self.inner.try_get_unconfirmed_chunk()
    }

    fn key_image_exists(&self, key_image: &EdwardsPoint) -> bool {
        self.inner.key_image_exists(key_image)
    }

    fn num_enotes(&self) -> u64 {
        self.inner.num_enotes()
    }

    fn enote_at(&self, index: u64) -> Option<(EdwardsPoint, EdwardsPoint)> {
        self.inner.enote_at(index)
    }

    fn chain_height(&self) -> u64 {
        self.inner.chain_height()
    }

    fn top_block_id(&self) -> Option<(u64, [u8; 32])> {
        self.inner.top_block_id()
    }
}

/// Pops and replaces the tip block before every on-chain chunk fetch, so
/// the scanner's view of the chain never settles.
struct ChurnLedger<'a> {
    inner: &'a MockLedger,
    decoy_dest: Destination,
}

impl Ledger for ChurnLedger<'_> {
    fn try_get_onchain_chunk(&self, start: u64, max_size: u64) -> WalletResult<ChunkData> {
        self.inner.pop_blocks(1);
        self.inner
            .add_coinbase_block(vec![enote_to(&self.decoy_dest, 1)]);
        self.inner.try_get_onchain_chunk(start, max_size)
    }

    fn try_get_unconfirmed_chunk(&self) -> WalletResult<ChunkData> {
        self.inner.try_get_unconfirmed_chunk()
    }

    fn key_image_exists(&self, key_image: &EdwardsPoint) -> bool {
        self.inner.key_image_exists(key_image)
    }

    fn num_enotes(&self) -> u64 {
        self.inner.num_enotes()
    }

    fn enote_at(&self, index: u64) -> Option<(EdwardsPoint, EdwardsPoint)> {
        self.inner.enote_at(index)
    }

    fn chain_height(&self) -> u64 {
        self.inner.chain_height()
    }

    fn top_block_id(&self) -> Option<(u64, [u8; 32])> {
        self.inner.top_block_id()
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_trivial_ledger_single_coinbase() {
    let (keys, dest) = wallet();
    let ledger = MockLedger::new();
    ledger.add_coinbase_block(vec![enote_to(&dest, 1)]);

    let mut store = EnoteStore::new(0);
    refresh(&ledger, &keys.view_balance, &mut store, &ScanConfig::default()).unwrap();

    assert_eq!(store.onchain_balance(), 1);
    assert_eq!(store.unconfirmed_balance(), 0);

    let record = &store.spendable_records()[0];
    assert!(store.has_enote_with_key_image(&record.key_image.compress().to_bytes()));
}

#[test]
fn test_full_replacement_reorg_escalates_to_full_rescan() {
    let (keys_a, dest_a) = wallet();
    let (keys_b, _) = wallet();
    let (_, decoy_dest) = wallet();

    let ledger = MockLedger::new();
    ledger.add_coinbase_block(vec![enote_to(&dest_a, 4)]);
    ledger.add_coinbase_block(vec![enote_to(&decoy_dest, 1)]);
    ledger.add_coinbase_block(vec![enote_to(&decoy_dest, 1)]);

    // After the scanner has applied blocks 0 and 1, replace blocks 1 and 2
    // with a chain crediting A with 3 and 5.
    let adversarial = OneShotReorgLedger::new(
        &ledger,
        3,
        2,
        vec![vec![enote_to(&dest_a, 3)], vec![enote_to(&dest_a, 5)]],
    );

    // Zero avoidance depth: partial rescans restart at the scanned tip and
    // keep hitting the discontinuity until the full rescan clears it.
    let config = ScanConfig {
        reorg_avoidance_depth: 0,
        max_chunk_size: 1,
        max_partialscan_attempts: 3,
    };

    let mut store_a = EnoteStore::new(0);
    refresh(&adversarial, &keys_a.view_balance, &mut store_a, &config).unwrap();
    assert_eq!(store_a.onchain_balance(), 12);

    // The full rescan restarted from the wallet birth height.
    assert_eq!(adversarial.min_start_after.get(), Some(0));

    let mut store_b = EnoteStore::new(0);
    refresh(&ledger, &keys_b.view_balance, &mut store_b, &ScanConfig::default()).unwrap();
    assert_eq!(store_b.onchain_balance(), 0);
}

#[test]
fn test_shallow_reorg_recovered_by_partial_rescan() {
    let (keys_b, dest_b) = wallet();
    let (_, decoy_dest) = wallet();

    // Four decoy blocks, then B receives 1 and 2.
    let ledger = MockLedger::new();
    for _ in 0..4 {
        ledger.add_coinbase_block(vec![enote_to(&decoy_dest, 1)]);
    }
    ledger.add_coinbase_block(vec![enote_to(&dest_b, 1)]);
    ledger.add_coinbase_block(vec![enote_to(&dest_b, 2)]);

    // The seventh fetch finds the chain tip replaced: blocks 4 and 5 give
    // way to coinbases of 3 and 5 for B.
    let adversarial = OneShotReorgLedger::new(
        &ledger,
        7,
        2,
        vec![vec![enote_to(&dest_b, 3)], vec![enote_to(&dest_b, 5)]],
    );

    let config = ScanConfig {
        reorg_avoidance_depth: 3,
        max_chunk_size: 1,
        max_partialscan_attempts: 3,
    };
    let mut store = EnoteStore::new(0);
    refresh(&adversarial, &keys_b.view_balance, &mut store, &config).unwrap();

    assert_eq!(store.onchain_balance(), 8);
    // Recovery restarted within the avoidance window, not from birth.
    assert_eq!(adversarial.min_start_after.get(), Some(3));
}

#[test]
fn test_constant_churn_exhausts_rescan_budget() {
    let (keys, dest) = wallet();
    let (_, decoy_dest) = wallet();

    let ledger = MockLedger::new();
    ledger.add_coinbase_block(vec![enote_to(&dest, 2)]);
    ledger.add_coinbase_block(vec![enote_to(&decoy_dest, 1)]);
    ledger.add_coinbase_block(vec![enote_to(&decoy_dest, 1)]);

    let churn = ChurnLedger {
        inner: &ledger,
        decoy_dest,
    };
    let config = ScanConfig {
        reorg_avoidance_depth: 3,
        max_chunk_size: 1,
        max_partialscan_attempts: 4,
    };

    let mut store = EnoteStore::new(0);
    let err = refresh(&churn, &keys.view_balance, &mut store, &config).unwrap_err();
    assert!(matches!(err, WalletError::ScanFailed(_)));

    // Successfully applied chunks survive: the stable bottom block held
    // the wallet's enote.
    assert_eq!(store.onchain_balance(), 2);
}

#[test]
fn test_transient_fetch_failures_consume_rescan_budget() {
    let (keys, dest) = wallet();
    let ledger = MockLedger::new();
    ledger.add_coinbase_block(vec![enote_to(&dest, 3)]);
    ledger.add_coinbase_block(vec![enote_to(&dest, 4)]);

    // Two timeouts, then the ledger behaves; three attempts in budget.
    let flaky = FlakyLedger {
        inner: &ledger,
        failures: Cell::new(2),
    };
    let config = ScanConfig {
        max_partialscan_attempts: 3,
        ..ScanConfig::default()
    };

    let mut store = EnoteStore::new(0);
    refresh(&flaky, &keys.view_balance, &mut store, &config).unwrap();
    assert_eq!(store.onchain_balance(), 7);
}

#[test]
fn test_persistent_fetch_failure_surfaces_after_budget() {
    let (keys, dest) = wallet();
    let ledger = MockLedger::new();
    ledger.add_coinbase_block(vec![enote_to(&dest, 1)]);

    let flaky = FlakyLedger {
        inner: &ledger,
        failures: Cell::new(u32::MAX),
    };
    let config = ScanConfig {
        max_partialscan_attempts: 2,
        ..ScanConfig::default()
    };

    let mut store = EnoteStore::new(0);
    let err = refresh(&flaky, &keys.view_balance, &mut store, &config).unwrap_err();
    assert!(matches!(err, WalletError::ChunkFetch(_)));
    assert_eq!(store.onchain_balance(), 0);
}

#[test]
fn test_rescan_after_explicit_pop_is_consistent() {
    let (keys, dest) = wallet();
    let ledger = MockLedger::new();
    ledger.add_coinbase_block(vec![enote_to(&dest, 7)]);
    ledger.add_coinbase_block(vec![enote_to(&dest, 9)]);

    let mut store = EnoteStore::new(0);
    refresh(&ledger, &keys.view_balance, &mut store, &ScanConfig::default()).unwrap();
    assert_eq!(store.onchain_balance(), 16);

    ledger.pop_blocks(1);
    refresh(&ledger, &keys.view_balance, &mut store, &ScanConfig::default()).unwrap();
    assert_eq!(store.onchain_balance(), 7);
}
