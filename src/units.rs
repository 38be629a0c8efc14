//! Fixed-point wire values → Decimal
//!
//! Balances, supplies and commit amounts arrive as integers scaled by the
//! settlement token decimals; oracle prices are WAD (18 decimals).
//! `Decimal` carries a 96-bit mantissa, so values with more significant
//! digits than that drop their least-significant fractional digits.

use crate::error::{Result, WatcherError};
use alloy::primitives::{I256, U256};
use rust_decimal::Decimal;

/// Oracle prices and keeper execution prices are WAD-scaled
pub const WAD_DECIMALS: u8 = 18;

/// Largest mantissa a Decimal can hold (2^96 - 1)
const MAX_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;

/// Decimal supports at most 28 fractional digits
const MAX_SCALE: u32 = 28;

/// Convert an unsigned fixed-point integer with `decimals` fractional digits.
pub fn from_fixed_point(raw: U256, decimals: u8) -> Result<Decimal> {
    let mantissa: u128 = raw
        .try_into()
        .map_err(|_| WatcherError::Conversion(format!("{} does not fit in 128 bits", raw)))?;
    scaled(mantissa, decimals as u32, false)
}

/// Signed variant, used for oracle prices (`int256` on the wire).
pub fn from_signed_fixed_point(raw: I256, decimals: u8) -> Result<Decimal> {
    let negative = raw.is_negative();
    let mantissa: u128 = raw
        .unsigned_abs()
        .try_into()
        .map_err(|_| WatcherError::Conversion(format!("{} does not fit in 128 bits", raw)))?;
    scaled(mantissa, decimals as u32, negative)
}

fn scaled(mut mantissa: u128, mut scale: u32, negative: bool) -> Result<Decimal> {
    while scale > MAX_SCALE || mantissa > MAX_MANTISSA {
        if scale == 0 {
            return Err(WatcherError::Conversion(format!(
                "{} exceeds the decimal range",
                mantissa
            )));
        }
        mantissa /= 10;
        scale -= 1;
    }

    // mantissa <= 2^96 - 1 so the i128 cast is lossless
    let mut value = Decimal::from_i128_with_scale(mantissa as i128, scale);
    if negative {
        value.set_sign_negative(true);
    }
    Ok(value.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_settlement_token_amount() {
        let raw = U256::from(120_000u64) * U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(from_fixed_point(raw, 18).unwrap(), dec!(120000));
    }

    #[test]
    fn test_six_decimal_token() {
        let raw = U256::from(1_500_250u64);
        assert_eq!(from_fixed_point(raw, 6).unwrap(), dec!(1.50025));
    }

    #[test]
    fn test_zero() {
        assert_eq!(from_fixed_point(U256::ZERO, 18).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_negative_oracle_price() {
        let raw = I256::try_from(-2_500_000_000_000_000_000i128).unwrap();
        assert_eq!(from_signed_fixed_point(raw, WAD_DECIMALS).unwrap(), dec!(-2.5));
    }

    #[test]
    fn test_excess_precision_is_truncated() {
        // 10^30 + 1 with 30 decimals: 31 significant digits, more than a Decimal holds
        let raw = U256::from(10u64).pow(U256::from(30u64)) + U256::from(1u64);
        let value = from_fixed_point(raw, 30).unwrap();
        assert_eq!(value, dec!(1));
    }

    #[test]
    fn test_integer_overflow_is_error() {
        let raw = U256::from(u128::MAX);
        assert!(matches!(
            from_fixed_point(raw, 0),
            Err(WatcherError::Conversion(_))
        ));
        assert!(from_fixed_point(U256::MAX, 18).is_err());
    }
}
