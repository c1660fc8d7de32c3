//! The capability-partitioned wallet key hierarchy.
//!
//! The hierarchy is a DAG rooted at `(k_m, k_vb)`:
//!
//! ```text
//! k_m (master spend)     k_vb (view balance)
//!        \                 |─ k_ua (unlock amounts)
//!         \                |─ k_fr (find received)
//!          \               |─ s_ga (generate address) ── s_ct (cipher tag)
//!           \              |
//!            K₁ = k_vb·X + k_m·U
//! ```
//!
//! Deployments are expressed by *withholding* secrets: a scan-only daemon
//! holds `k_fr`; a payment validator holds [`IntermediateViewKeys`]; a
//! view-only wallet holds [`ViewBalanceKeys`]; only a signer holds
//! [`WalletKeys`]. Each operation takes the narrowest capability struct
//! that can perform it.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::generators::{GEN_U, GEN_X};
use crate::hashing::hash_to_scalar;

/// Largest valid address index (56-bit space).
pub const MAX_ADDRESS_INDEX: u64 = (1 << 56) - 1;

/// Full signing keys: the master spend secret plus the view hierarchy.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct WalletKeys {
    /// Master spend secret `k_m` (root of signing authority).
    pub k_m: Scalar,
    /// The view-balance hierarchy derived from `k_vb`.
    pub view_balance: ViewBalanceKeys,
}

/// The view-balance hierarchy: everything derivable from `k_vb` plus the
/// public base spend key.
///
/// Sufficient for full scanning (including key images) and for building
/// unsigned transactions; insufficient for spending.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ViewBalanceKeys {
    /// View-balance secret `k_vb`.
    pub k_vb: Scalar,
    /// Unlock-amounts secret `k_ua = H_n("unlock_amounts" ‖ k_vb)`.
    pub k_ua: Scalar,
    /// Find-received secret `k_fr = H_n("find_received" ‖ k_vb)`.
    pub k_fr: Scalar,
    /// Generate-address secret `s_ga = H_n("generate_address" ‖ k_vb)`.
    pub s_ga: Scalar,
    /// Cipher-tag secret `s_ct = H_n("cipher_tag" ‖ s_ga)`.
    pub s_ct: Scalar,
    /// Base spend pubkey `K₁ = k_vb·X + k_m·U`.
    pub base_spend_pubkey: EdwardsPoint,
    /// Unlock-amounts pubkey `K_ua = k_ua·G`.
    pub unlock_pubkey: EdwardsPoint,
    /// Find-received pubkey `K_fr = k_fr·K_ua`.
    pub findreceived_pubkey: EdwardsPoint,
}

/// Keys held by a payment validator: can identify owned plain enotes and
/// decrypt their amounts, cannot compute key images or see self-sends.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct IntermediateViewKeys {
    /// Unlock-amounts secret.
    pub k_ua: Scalar,
    /// Find-received secret.
    pub k_fr: Scalar,
    /// Generate-address secret.
    pub s_ga: Scalar,
    /// Cipher-tag secret.
    pub s_ct: Scalar,
    /// Base spend pubkey `K₁`.
    pub base_spend_pubkey: EdwardsPoint,
    /// Unlock-amounts pubkey `K_ua`.
    pub unlock_pubkey: EdwardsPoint,
    /// Find-received pubkey `K_fr`.
    pub findreceived_pubkey: EdwardsPoint,
}

/// Keys sufficient to produce destinations and recover address indices.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct GenerateAddressKeys {
    /// Generate-address secret.
    pub s_ga: Scalar,
    /// Cipher-tag secret.
    pub s_ct: Scalar,
    /// Base spend pubkey `K₁`.
    pub base_spend_pubkey: EdwardsPoint,
    /// Unlock-amounts pubkey `K_ua`.
    pub unlock_pubkey: EdwardsPoint,
    /// Find-received pubkey `K_fr`.
    pub findreceived_pubkey: EdwardsPoint,
}

impl WalletKeys {
    /// Generate a fresh wallet: random `(k_m, k_vb)`, everything else derived.
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let k_m = random_scalar(rng);
        let k_vb = random_scalar(rng);
        Self::from_master_keys(k_m, k_vb)
    }

    /// Rebuild the hierarchy from the two root secrets.
    #[must_use]
    pub fn from_master_keys(k_m: Scalar, k_vb: Scalar) -> Self {
        let base_spend_pubkey = k_vb * *GEN_X + k_m * *GEN_U;
        let view_balance = ViewBalanceKeys::derive(k_vb, base_spend_pubkey);
        Self { k_m, view_balance }
    }
}

impl ViewBalanceKeys {
    /// Derive the full view hierarchy from `k_vb` and the (public) base
    /// spend key.
    #[must_use]
    pub fn derive(k_vb: Scalar, base_spend_pubkey: EdwardsPoint) -> Self {
        let k_ua = hash_to_scalar(b"jamtis_unlock_amounts_key", &[k_vb.as_bytes()]);
        let k_fr = hash_to_scalar(b"jamtis_find_received_key", &[k_vb.as_bytes()]);
        let s_ga = hash_to_scalar(b"jamtis_generate_address_secret", &[k_vb.as_bytes()]);
        let s_ct = hash_to_scalar(b"jamtis_cipher_tag_secret", &[s_ga.as_bytes()]);
        let unlock_pubkey = EdwardsPoint::mul_base(&k_ua);
        let findreceived_pubkey = k_fr * unlock_pubkey;
        Self {
            k_vb,
            k_ua,
            k_fr,
            s_ga,
            s_ct,
            base_spend_pubkey,
            unlock_pubkey,
            findreceived_pubkey,
        }
    }

    /// Narrow to the payment-validator capability.
    #[must_use]
    pub fn intermediate_keys(&self) -> IntermediateViewKeys {
        IntermediateViewKeys {
            k_ua: self.k_ua,
            k_fr: self.k_fr,
            s_ga: self.s_ga,
            s_ct: self.s_ct,
            base_spend_pubkey: self.base_spend_pubkey,
            unlock_pubkey: self.unlock_pubkey,
            findreceived_pubkey: self.findreceived_pubkey,
        }
    }

    /// Narrow to the address-generation capability.
    #[must_use]
    pub fn address_keys(&self) -> GenerateAddressKeys {
        GenerateAddressKeys {
            s_ga: self.s_ga,
            s_ct: self.s_ct,
            base_spend_pubkey: self.base_spend_pubkey,
            unlock_pubkey: self.unlock_pubkey,
            findreceived_pubkey: self.findreceived_pubkey,
        }
    }
}

impl IntermediateViewKeys {
    /// Narrow to the address-generation capability.
    #[must_use]
    pub fn address_keys(&self) -> GenerateAddressKeys {
        GenerateAddressKeys {
            s_ga: self.s_ga,
            s_ct: self.s_ct,
            base_spend_pubkey: self.base_spend_pubkey,
            unlock_pubkey: self.unlock_pubkey,
            findreceived_pubkey: self.findreceived_pubkey,
        }
    }
}

/// Draw a uniformly random scalar.
pub fn random_scalar(rng: &mut (impl RngCore + CryptoRng)) -> Scalar {
    let mut bytes = [0u8; 64];
    rng.fill_bytes(&mut bytes);
    let scalar = Scalar::from_bytes_mod_order_wide(&bytes);
    bytes.zeroize();
    scalar
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_hierarchy_is_deterministic() {
        let keys = WalletKeys::generate(&mut OsRng);
        let rebuilt = WalletKeys::from_master_keys(keys.k_m, keys.view_balance.k_vb);
        assert_eq!(keys.view_balance.k_fr, rebuilt.view_balance.k_fr);
        assert_eq!(keys.view_balance.s_ct, rebuilt.view_balance.s_ct);
        assert_eq!(
            keys.view_balance.base_spend_pubkey.compress(),
            rebuilt.view_balance.base_spend_pubkey.compress()
        );
    }

    #[test]
    fn test_view_balance_alone_rebuilds_view_keys() {
        let keys = WalletKeys::generate(&mut OsRng);
        let vb = ViewBalanceKeys::derive(
            keys.view_balance.k_vb,
            keys.view_balance.base_spend_pubkey,
        );
        assert_eq!(vb.k_ua, keys.view_balance.k_ua);
        assert_eq!(
            vb.findreceived_pubkey.compress(),
            keys.view_balance.findreceived_pubkey.compress()
        );
    }

    #[test]
    fn test_distinct_wallets_distinct_keys() {
        let a = WalletKeys::generate(&mut OsRng);
        let b = WalletKeys::generate(&mut OsRng);
        assert_ne!(a.view_balance.k_fr, b.view_balance.k_fr);
    }
}
