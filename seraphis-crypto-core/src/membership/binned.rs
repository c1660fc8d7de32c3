//! Binned reference sets: compact decoy-set encoding.
//!
//! Instead of listing every reference index, a transaction input carries
//! bins. Each bin is a locus (an index on the ledger) plus implicit
//! members spread over the window `[locus − r, locus + r]`; members are
//! expanded deterministically from a public seed, so the full set is
//! reproducible from
//!
//! ```text
//! (config, seed, rotation_factor, bin_loci)
//! ```
//!
//! The rotation factor is chosen at construction so that one expanded
//! member lands exactly on the real enote's index. Verifiers and scanners
//! expand with [`BinnedReferenceSet::indices`] and cannot tell the real
//! bin from the decoy bins.

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::hashing::hash_to_bytes;
use crate::types::errors::{CoreError, CoreResult};

/// Shape parameters for binned reference sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinConfig {
    /// Half-width of each bin's index window.
    pub bin_radius: u16,
    /// Members expanded per bin.
    pub num_bin_members: u16,
}

impl BinConfig {
    /// Window width `2r + 1`.
    #[must_use]
    pub fn bin_width(&self) -> u64 {
        2 * u64::from(self.bin_radius) + 1
    }
}

/// A compact reference set: expand with [`BinnedReferenceSet::indices`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinnedReferenceSet {
    /// Shape parameters.
    pub config: BinConfig,
    /// Public expansion seed.
    pub seed: [u8; 32],
    /// Shared member rotation within each bin's window.
    pub rotation_factor: u64,
    /// Bin centers, ascending.
    pub bin_loci: Vec<u64>,
}

/// Validate a bin configuration against a requested reference-set size.
///
/// # Errors
/// `InvalidBinConfig` when members cannot be distinct within a window or
/// the set size does not divide into whole bins.
pub fn check_bin_config(ref_set_size: u64, config: &BinConfig) -> CoreResult<()> {
    if config.num_bin_members == 0 {
        return Err(CoreError::InvalidBinConfig("zero members per bin".into()));
    }
    if u64::from(config.num_bin_members) > config.bin_width() {
        return Err(CoreError::InvalidBinConfig(format!(
            "{} members cannot be distinct in a window of {}",
            config.num_bin_members,
            config.bin_width()
        )));
    }
    if ref_set_size == 0 || ref_set_size % u64::from(config.num_bin_members) != 0 {
        return Err(CoreError::InvalidBinConfig(format!(
            "reference set size {ref_set_size} is not a multiple of {} bin members",
            config.num_bin_members
        )));
    }
    Ok(())
}

/// Map a uniform `u64` onto `[0, n)` without modulo bias worth caring
/// about at ledger scales.
fn map_to_range(sample: u64, n: u64) -> u64 {
    ((u128::from(sample) * u128::from(n)) >> 64) as u64
}

fn member_sample(seed: &[u8; 32], bin_index: u64, counter: u64) -> u64 {
    let digest = hash_to_bytes(
        b"sp_binned_refset_member",
        &[seed, &bin_index.to_le_bytes(), &counter.to_le_bytes()],
    );
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Distinct member offsets in `[0, width)` for one bin, in generation
/// order. Rejection-samples duplicates.
fn member_offsets(seed: &[u8; 32], bin_index: u64, count: u16, width: u64) -> Vec<u64> {
    let mut offsets: Vec<u64> = Vec::with_capacity(usize::from(count));
    let mut counter = 0u64;
    while offsets.len() < usize::from(count) {
        let offset = map_to_range(member_sample(seed, bin_index, counter), width);
        counter += 1;
        if !offsets.contains(&offset) {
            offsets.push(offset);
        }
    }
    offsets
}

impl BinnedReferenceSet {
    /// Build a reference set of `ref_set_size` members covering
    /// `real_index`, with decoy bins drawn uniformly over the ledger.
    ///
    /// Returns the set and the flat position of the real index within
    /// [`BinnedReferenceSet::indices`].
    ///
    /// # Errors
    /// `InvalidBinConfig` on a bad shape; `RefSetTooLarge` when the ledger
    /// is smaller than one bin window.
    pub fn new(
        config: BinConfig,
        real_index: u64,
        ledger_size: u64,
        ref_set_size: u64,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> CoreResult<(Self, usize)> {
        check_bin_config(ref_set_size, &config)?;
        let width = config.bin_width();
        if ledger_size < width || real_index >= ledger_size {
            return Err(CoreError::RefSetTooLarge {
                requested: ref_set_size,
                available: ledger_size,
            });
        }

        let radius = u64::from(config.bin_radius);
        let num_bins = ref_set_size / u64::from(config.num_bin_members);

        // Valid loci keep the whole window on the ledger.
        let locus_max = ledger_size - 1 - radius;
        let real_locus = real_index.clamp(radius, locus_max);

        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);

        let mut bin_loci: Vec<u64> = Vec::with_capacity(num_bins as usize);
        bin_loci.push(real_locus);
        for _ in 1..num_bins {
            let locus = radius + map_to_range(rng.next_u64(), locus_max - radius + 1);
            bin_loci.push(locus);
        }
        bin_loci.sort_unstable();

        // Any bin holding the real locus works; pick the first.
        let real_bin = bin_loci
            .iter()
            .position(|locus| *locus == real_locus)
            .ok_or_else(|| CoreError::InvalidBinConfig("real locus lost".into()))?;

        // Rotate all bins so the real bin's first member hits real_index.
        let offsets = member_offsets(&seed, real_bin as u64, config.num_bin_members, width);
        let base = real_locus - radius;
        let rotation_factor = (width + (real_index - base) % width - offsets[0] % width) % width;

        let set = Self {
            config,
            seed,
            rotation_factor,
            bin_loci,
        };
        let real_position = real_bin * usize::from(config.num_bin_members);
        debug_assert_eq!(set.indices()[real_position], real_index);
        Ok((set, real_position))
    }

    /// Total member count.
    #[must_use]
    pub fn size(&self) -> usize {
        self.bin_loci.len() * usize::from(self.config.num_bin_members)
    }

    /// Expand the full reference index list, bin by bin in stored order.
    #[must_use]
    pub fn indices(&self) -> Vec<u64> {
        let width = self.config.bin_width();
        let radius = u64::from(self.config.bin_radius);
        let mut out = Vec::with_capacity(self.size());
        for (bin_index, locus) in self.bin_loci.iter().enumerate() {
            let base = locus - radius;
            for offset in member_offsets(
                &self.seed,
                bin_index as u64,
                self.config.num_bin_members,
                width,
            ) {
                out.push(base + (offset + self.rotation_factor) % width);
            }
        }
        out
    }
}
