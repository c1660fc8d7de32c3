//! Discretized fees and amount display.
//!
//! Fees are quantized to one significant decimal digit: the representable
//! values are `m · 10^e` with `m ∈ [1, 9]`, plus zero and a saturating
//! maximum. Quantization rounds *up* to the nearest representable value,
//! and representable values round-trip exactly through
//! [`DiscretizedFee::from_fee_value`].

use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};

/// Decimal places in displayed amounts (atomic units per coin = 10^12).
pub const AMOUNT_DECIMALS: u32 = 12;

const MAX_EXPONENT: u8 = 19; // 1·10^19 < 2^64

/// A fee quantized to one significant digit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscretizedFee {
    mantissa: u8,
    exponent: u8,
}

impl DiscretizedFee {
    /// The zero fee.
    pub const ZERO: DiscretizedFee = DiscretizedFee {
        mantissa: 0,
        exponent: 0,
    };

    /// Saturating maximum (`u64::MAX`); used when no representable value
    /// is `≥` the requested fee.
    pub const MAX: DiscretizedFee = DiscretizedFee {
        mantissa: u8::MAX,
        exponent: u8::MAX,
    };

    /// Smallest representable fee `≥ raw`.
    #[must_use]
    pub fn from_fee_value(raw: u64) -> Self {
        if raw == 0 {
            return Self::ZERO;
        }
        for exponent in 0..=MAX_EXPONENT {
            let unit = 10u64.pow(u32::from(exponent));
            // Largest mantissa at this exponent without overflow.
            let cap = if exponent == MAX_EXPONENT { 1 } else { 9 };
            for mantissa in 1..=cap {
                let value = mantissa * unit;
                if value >= raw {
                    return Self {
                        mantissa: mantissa as u8,
                        exponent,
                    };
                }
            }
        }
        Self::MAX
    }

    /// The integer fee value.
    #[must_use]
    pub fn value(&self) -> u64 {
        if *self == Self::MAX {
            return u64::MAX;
        }
        u64::from(self.mantissa) * 10u64.pow(u32::from(self.exponent))
    }
}

/// Fee-rate parameters for the simple linear weight model.
#[derive(Clone, Copy, Debug)]
pub struct FeeConfig {
    /// Fee per weight unit, in atomic units.
    pub fee_per_weight: u64,
    /// Fixed weight of the transaction envelope.
    pub base_weight: u64,
    /// Weight contributed per input.
    pub input_weight: u64,
    /// Weight contributed per output.
    pub output_weight: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            fee_per_weight: 1,
            base_weight: 50,
            input_weight: 30,
            output_weight: 20,
        }
    }
}

impl FeeConfig {
    /// Discretized fee for a transaction shape.
    #[must_use]
    pub fn fee_for(&self, num_inputs: usize, num_outputs: usize) -> DiscretizedFee {
        let weight = self.base_weight
            + self.input_weight * num_inputs as u64
            + self.output_weight * num_outputs as u64;
        DiscretizedFee::from_fee_value(weight.saturating_mul(self.fee_per_weight))
    }
}

/// Render an atomic-unit amount as a decimal coin string.
#[must_use]
pub fn display_amount(amount: u64) -> String {
    let unit = 10u64.pow(AMOUNT_DECIMALS);
    format!(
        "{}.{:0width$}",
        amount / unit,
        amount % unit,
        width = AMOUNT_DECIMALS as usize
    )
}

/// Parse a decimal coin string back to atomic units.
///
/// # Errors
/// `MalformedAmount` on bad syntax, too many decimals, or overflow.
pub fn amount_from_string(s: &str) -> WalletResult<u64> {
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    // Digits only: u64::from_str would accept a leading sign.
    if whole.is_empty()
        || frac.len() > AMOUNT_DECIMALS as usize
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !frac.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(WalletError::MalformedAmount(s.into()));
    }
    let whole: u64 = whole
        .parse()
        .map_err(|_| WalletError::MalformedAmount(s.into()))?;
    let frac_value: u64 = if frac.is_empty() {
        0
    } else {
        let parsed: u64 = frac
            .parse()
            .map_err(|_| WalletError::MalformedAmount(s.into()))?;
        parsed * 10u64.pow(AMOUNT_DECIMALS - frac.len() as u32)
    };
    let unit = 10u64.pow(AMOUNT_DECIMALS);
    whole
        .checked_mul(unit)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| WalletError::MalformedAmount(s.into()))
}
