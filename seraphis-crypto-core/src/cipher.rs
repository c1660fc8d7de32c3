//! The 16-byte address-tag cipher.
//!
//! An address tag is the owner's 56-bit address index `j`, authenticated
//! and hidden so that third parties cannot link addresses of one wallet:
//!
//! ```text
//! tag = Twofish_k(s_ct)( j_le[0..7] ‖ mac[0..9] )
//! mac = Keccak256("jamtis_address_tag_mac" ‖ s_ct ‖ j_le)[0..9]
//! ```
//!
//! Twofish is used because the tag must be a length-preserving 16-byte
//! block. The MAC is verified in constant time on every decipher, so a
//! scanner gets a uniform "not mine" verdict for foreign tags.
//!
//! On-chain the tag is additionally XORed with a pad derived from the
//! sender-receiver secret, so the same address never produces a
//! recognizable tag across enotes.

use core::fmt;

use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};
use twofish::Twofish;

use crate::hashing::{ct_eq, hash_to_bytes};
use crate::keys::hierarchy::MAX_ADDRESS_INDEX;
use crate::types::errors::{CoreError, CoreResult};

/// Total address-tag width.
pub const ADDRESS_TAG_BYTES: usize = 16;

/// Width of the little-endian address index inside a tag.
pub const ADDRESS_INDEX_BYTES: usize = 7;

/// Width of the MAC inside a tag. Frozen into the wire format.
pub const ADDRESS_TAG_MAC_BYTES: usize = 9;

/// A ciphered (and possibly pad-encrypted) address tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressTag(pub [u8; ADDRESS_TAG_BYTES]);

impl fmt::Display for AddressTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Address-tag cipher keyed from the cipher-tag secret `s_ct`.
pub struct AddressTagCipher {
    cipher: Twofish,
    s_ct: Scalar,
}

impl AddressTagCipher {
    /// Key the cipher from `s_ct`.
    #[must_use]
    pub fn new(s_ct: &Scalar) -> Self {
        let key = hash_to_bytes(b"jamtis_address_tag_cipher_key", &[s_ct.as_bytes()]);
        let cipher = Twofish::new(GenericArray::from_slice(&key));
        Self {
            cipher,
            s_ct: *s_ct,
        }
    }

    /// Cipher an address index into a tag.
    ///
    /// # Errors
    /// `AddressIndexOutOfRange` if `j` exceeds 56 bits.
    pub fn cipher_index(&self, j: u64) -> CoreResult<AddressTag> {
        if j > MAX_ADDRESS_INDEX {
            return Err(CoreError::AddressIndexOutOfRange(j));
        }

        let mut block = [0u8; ADDRESS_TAG_BYTES];
        block[..ADDRESS_INDEX_BYTES].copy_from_slice(&j.to_le_bytes()[..ADDRESS_INDEX_BYTES]);
        block[ADDRESS_INDEX_BYTES..].copy_from_slice(&self.index_mac(j));

        let ga_block = GenericArray::from_mut_slice(&mut block);
        self.cipher.encrypt_block(ga_block);
        Ok(AddressTag(block))
    }

    /// Decipher a tag; `None` means "not mine".
    ///
    /// The MAC comparison is constant time over valid/invalid outcomes.
    #[must_use]
    pub fn try_decipher_index(&self, tag: &AddressTag) -> Option<u64> {
        let mut block = tag.0;
        let ga_block = GenericArray::from_mut_slice(&mut block);
        self.cipher.decrypt_block(ga_block);

        let mut j_bytes = [0u8; 8];
        j_bytes[..ADDRESS_INDEX_BYTES].copy_from_slice(&block[..ADDRESS_INDEX_BYTES]);
        let j = u64::from_le_bytes(j_bytes);

        let expected_mac = self.index_mac(j);
        if ct_eq(&block[ADDRESS_INDEX_BYTES..], &expected_mac) {
            Some(j)
        } else {
            None
        }
    }

    fn index_mac(&self, j: u64) -> [u8; ADDRESS_TAG_MAC_BYTES] {
        let digest = hash_to_bytes(
            b"jamtis_address_tag_mac",
            &[self.s_ct.as_bytes(), &j.to_le_bytes()[..ADDRESS_INDEX_BYTES]],
        );
        let mut mac = [0u8; ADDRESS_TAG_MAC_BYTES];
        mac.copy_from_slice(&digest[..ADDRESS_TAG_MAC_BYTES]);
        mac
    }
}

/// XOR pad applied to a tag on-chain, derived from the sender-receiver
/// secret `q` and the one-time address.
#[must_use]
pub fn encrypt_address_tag(
    sender_receiver_secret: &Scalar,
    onetime_address: &EdwardsPoint,
    tag: &AddressTag,
) -> AddressTag {
    let pad = hash_to_bytes(
        b"jamtis_encrypted_address_tag",
        &[
            sender_receiver_secret.as_bytes(),
            onetime_address.compress().as_bytes(),
        ],
    );
    let mut out = tag.0;
    for (byte, pad_byte) in out.iter_mut().zip(pad.iter()) {
        *byte ^= pad_byte;
    }
    AddressTag(out)
}

/// Inverse of [`encrypt_address_tag`] (XOR is symmetric).
#[must_use]
pub fn decrypt_address_tag(
    sender_receiver_secret: &Scalar,
    onetime_address: &EdwardsPoint,
    tag: &AddressTag,
) -> AddressTag {
    encrypt_address_tag(sender_receiver_secret, onetime_address, tag)
}
