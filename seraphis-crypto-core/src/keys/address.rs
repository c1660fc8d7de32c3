//! Indexed destinations and address-index recovery.
//!
//! A destination for index `j` is the tuple
//! `(K₁_j, K_ua_j, K_fr_j, addr_tag_j)`:
//!
//! ```text
//! d_j    = H_n("address_privkey" ‖ K₁ ‖ s_ga ‖ j)
//! k^j_g  = H_n("spendkey_extension_g" ‖ K₁ ‖ s_ga ‖ j)
//! k^j_x  = H_n("spendkey_extension_x" ‖ K₁ ‖ s_ga ‖ j)
//! K₁_j   = K₁ + k^j_g·G + k^j_x·X
//! K_ua_j = d_j·K_ua
//! K_fr_j = d_j·K_fr
//! ```
//!
//! There is deliberately no `U` extension: the `U`-coefficient of every
//! one-time address stays exactly `k_m`, which is what lets the
//! view-balance holder compute key images without the master key.
//!
//! The zero index denotes the main address.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};

use crate::cipher::{AddressTag, AddressTagCipher};
use crate::generators::GEN_X;
use crate::hashing::hash_to_scalar;
use crate::keys::hierarchy::{GenerateAddressKeys, MAX_ADDRESS_INDEX};
use crate::types::errors::{CoreError, CoreResult};

/// A public destination: where a payment proposal sends funds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Indexed spend pubkey `K₁_j`.
    pub spend_pubkey: EdwardsPoint,
    /// Indexed unlock-amounts pubkey `K_ua_j`.
    pub unlock_pubkey: EdwardsPoint,
    /// Indexed find-received pubkey `K_fr_j` (DH base for ephemeral keys).
    pub findreceived_pubkey: EdwardsPoint,
    /// Ciphered address tag for `j`.
    pub address_tag: AddressTag,
}

/// Per-index address private key `d_j`.
#[must_use]
pub fn address_privkey(s_ga: &Scalar, base_spend_pubkey: &EdwardsPoint, j: u64) -> Scalar {
    index_scalar(b"jamtis_address_privkey", s_ga, base_spend_pubkey, j)
}

/// Spend-key extension on `G` for index `j`.
#[must_use]
pub fn address_extension_g(s_ga: &Scalar, base_spend_pubkey: &EdwardsPoint, j: u64) -> Scalar {
    index_scalar(b"jamtis_spendkey_extension_g", s_ga, base_spend_pubkey, j)
}

/// Spend-key extension on `X` for index `j`.
#[must_use]
pub fn address_extension_x(s_ga: &Scalar, base_spend_pubkey: &EdwardsPoint, j: u64) -> Scalar {
    index_scalar(b"jamtis_spendkey_extension_x", s_ga, base_spend_pubkey, j)
}

fn index_scalar(
    domain: &[u8],
    s_ga: &Scalar,
    base_spend_pubkey: &EdwardsPoint,
    j: u64,
) -> Scalar {
    hash_to_scalar(
        domain,
        &[
            base_spend_pubkey.compress().as_bytes(),
            s_ga.as_bytes(),
            &j.to_le_bytes(),
        ],
    )
}

/// Indexed spend pubkey `K₁_j`.
#[must_use]
pub fn make_indexed_spend_pubkey(
    s_ga: &Scalar,
    base_spend_pubkey: &EdwardsPoint,
    j: u64,
) -> EdwardsPoint {
    let ext_g = address_extension_g(s_ga, base_spend_pubkey, j);
    let ext_x = address_extension_x(s_ga, base_spend_pubkey, j);
    base_spend_pubkey + EdwardsPoint::mul_base(&ext_g) + ext_x * *GEN_X
}

/// Produce the destination for address index `j`.
///
/// # Errors
/// `AddressIndexOutOfRange` if `j` exceeds 56 bits.
pub fn make_destination(keys: &GenerateAddressKeys, j: u64) -> CoreResult<Destination> {
    if j > MAX_ADDRESS_INDEX {
        return Err(CoreError::AddressIndexOutOfRange(j));
    }

    let d_j = address_privkey(&keys.s_ga, &keys.base_spend_pubkey, j);
    let address_tag = AddressTagCipher::new(&keys.s_ct).cipher_index(j)?;

    Ok(Destination {
        spend_pubkey: make_indexed_spend_pubkey(&keys.s_ga, &keys.base_spend_pubkey, j),
        unlock_pubkey: d_j * keys.unlock_pubkey,
        findreceived_pubkey: d_j * keys.findreceived_pubkey,
        address_tag,
    })
}

/// Recover the address index from a destination's tag; `None` = not ours.
///
/// Constant-time over valid/invalid outcomes.
#[must_use]
pub fn try_recover_address_index(s_ct: &Scalar, tag: &AddressTag) -> Option<u64> {
    AddressTagCipher::new(s_ct).try_decipher_index(tag)
}

/// Check that a destination really belongs to this wallet, returning its
/// index. Rebuilds the destination from the recovered index and compares
/// all four components.
#[must_use]
pub fn try_match_destination(keys: &GenerateAddressKeys, dest: &Destination) -> Option<u64> {
    let j = try_recover_address_index(&keys.s_ct, &dest.address_tag)?;
    let rebuilt = make_destination(keys, j).ok()?;
    if rebuilt == *dest {
        Some(j)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::hierarchy::WalletKeys;
    use rand::rngs::OsRng;

    fn address_keys() -> GenerateAddressKeys {
        WalletKeys::generate(&mut OsRng).view_balance.address_keys()
    }

    #[test]
    fn test_recover_index_round_trip() {
        let keys = address_keys();
        for j in [0u64, 1, 55, 1 << 40, MAX_ADDRESS_INDEX] {
            let dest = make_destination(&keys, j).unwrap();
            assert_eq!(try_recover_address_index(&keys.s_ct, &dest.address_tag), Some(j));
            assert_eq!(try_match_destination(&keys, &dest), Some(j));
        }
    }

    #[test]
    fn test_index_out_of_range_rejected() {
        let keys = address_keys();
        assert!(make_destination(&keys, MAX_ADDRESS_INDEX + 1).is_err());
    }

    #[test]
    fn test_foreign_destination_not_matched() {
        let ours = address_keys();
        let theirs = address_keys();
        let dest = make_destination(&theirs, 3).unwrap();
        assert_eq!(try_match_destination(&ours, &dest), None);
    }

    #[test]
    fn test_destinations_unlinkable_across_indices() {
        let keys = address_keys();
        let a = make_destination(&keys, 1).unwrap();
        let b = make_destination(&keys, 2).unwrap();
        assert_ne!(a.spend_pubkey.compress(), b.spend_pubkey.compress());
        assert_ne!(a.findreceived_pubkey.compress(), b.findreceived_pubkey.compress());
        assert_ne!(a.address_tag, b.address_tag);
    }
}
