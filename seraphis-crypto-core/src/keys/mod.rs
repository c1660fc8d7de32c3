//! Key hierarchy, destinations, and key images.

pub mod address;
pub mod hierarchy;
pub mod image;

pub use address::{make_destination, try_match_destination, try_recover_address_index, Destination};
pub use hierarchy::{
    GenerateAddressKeys, IntermediateViewKeys, ViewBalanceKeys, WalletKeys, MAX_ADDRESS_INDEX,
};
pub use image::{compress_key_image, decompress_key_image, key_image_spend_component, make_key_image};
