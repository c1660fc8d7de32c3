//! Key image (linking tag) computation and compact encoding.
//!
//! For a one-time address `Ko = x·G + y·X + z·U` the key image is
//! `KI = (z/y)·U`. Because address and sender extensions never touch the
//! `U` component, `z` is exactly the master spend key (or the aggregate
//! multisig spend key), so a view-balance holder can compute `KI` as
//!
//! ```text
//! KI = y⁻¹ · (K₁ − k_vb·X)        (K₁ − k_vb·X = z·U)
//! ```
//!
//! without ever holding `z`.
//!
//! Key images are serialized in compact form `(1/8)·KI`; verifiers
//! multiply by the cofactor, which lands the result in the prime-order
//! subgroup by construction.

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::IsIdentity;

use crate::generators::{GEN_X, INV_EIGHT};
use crate::types::errors::{CoreError, CoreResult};

/// The `z·U` component of a base spend key: `K₁ − k_vb·X`.
#[must_use]
pub fn key_image_spend_component(base_spend_pubkey: &EdwardsPoint, k_vb: &Scalar) -> EdwardsPoint {
    base_spend_pubkey - k_vb * *GEN_X
}

/// Compute `KI = y⁻¹ · (z·U)` from the enote view privkey and the spend
/// component.
///
/// # Errors
/// `DegenerateEnoteViewKey` if `y == 0`.
pub fn make_key_image(
    enote_view_privkey: &Scalar,
    spend_component: &EdwardsPoint,
) -> CoreResult<EdwardsPoint> {
    if *enote_view_privkey == Scalar::ZERO {
        return Err(CoreError::DegenerateEnoteViewKey);
    }
    Ok(enote_view_privkey.invert() * spend_component)
}

/// Compact wire encoding `(1/8)·KI`.
#[must_use]
pub fn compress_key_image(key_image: &EdwardsPoint) -> CompressedEdwardsY {
    (*INV_EIGHT * key_image).compress()
}

/// Recover `KI` from its compact encoding.
///
/// Multiplying by the cofactor guarantees the result is torsion-free; a
/// zero key image is rejected.
///
/// # Errors
/// `InvalidPoint` on a non-decompressible encoding; `NotInPrimeSubgroup`
/// if the recovered image is the identity.
pub fn decompress_key_image(compact: &CompressedEdwardsY) -> CoreResult<EdwardsPoint> {
    let point = compact
        .decompress()
        .ok_or_else(|| CoreError::InvalidPoint("key image decompression failed".into()))?;
    let key_image = point.mul_by_cofactor();
    if key_image.is_identity() {
        return Err(CoreError::NotInPrimeSubgroup("key image is identity".into()));
    }
    Ok(key_image)
}
