//! Decimal arithmetic helpers.
//!
//! Every consensus-visible computation goes through `rust_decimal::Decimal`
//! so results are bit-identical across replicas. Amounts are integer base
//! units (`u128`); values and prices are decimals.

use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::utils::constants::BPS_DIVISOR;

// ═══════════════════════════════════════════════════════════════════════════════
// CONVERSIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Convert an integer amount into a decimal
pub fn amount_to_decimal(amount: u128) -> Result<Decimal> {
    Decimal::from_u128(amount).ok_or_else(|| Error::Overflow {
        operation: format!("decimal from amount {}", amount),
    })
}

/// Convert a non-negative decimal into an integer amount, rounding down
pub fn decimal_to_amount_floor(value: Decimal) -> Result<u128> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(Error::Underflow {
            operation: format!("amount from negative decimal {}", value),
        });
    }
    value.trunc().to_u128().ok_or_else(|| Error::Overflow {
        operation: format!("amount from decimal {}", value),
    })
}

/// Basis points as a decimal fraction (100 bps = 0.01)
pub fn bps_to_decimal(bps: u64) -> Decimal {
    Decimal::from(bps) / Decimal::from(BPS_DIVISOR)
}

/// Fraction as basis points, rounded down
pub fn decimal_to_bps(fraction: Decimal) -> u64 {
    (fraction * Decimal::from(BPS_DIVISOR))
        .trunc()
        .to_u64()
        .unwrap_or(u64::MAX)
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHECKED DECIMAL OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Checked decimal addition
pub fn dec_add(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or_else(|| Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Checked decimal subtraction
pub fn dec_sub(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_sub(b).ok_or_else(|| Error::Overflow {
        operation: format!("{} - {}", a, b),
    })
}

/// Checked decimal multiplication
pub fn dec_mul(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b).ok_or_else(|| Error::Overflow {
        operation: format!("{} * {}", a, b),
    })
}

/// Checked decimal division
pub fn dec_div(a: Decimal, b: Decimal) -> Result<Decimal> {
    if b.is_zero() {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    a.checked_div(b).ok_or_else(|| Error::Overflow {
        operation: format!("{} / {}", a, b),
    })
}

/// Computes (a * b) / c, multiplying first to keep precision
pub fn dec_mul_div(a: Decimal, b: Decimal, c: Decimal) -> Result<Decimal> {
    dec_div(dec_mul(a, b)?, c)
}

/// Relative deviation `|value - reference| / reference`
pub fn relative_deviation(value: Decimal, reference: Decimal) -> Result<Decimal> {
    Ok(dec_div(dec_sub(value, reference)?, reference)?.abs())
}

/// Signed relative deviation `(value - reference) / reference`
pub fn signed_deviation(value: Decimal, reference: Decimal) -> Result<Decimal> {
    dec_div(dec_sub(value, reference)?, reference)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE INTEGER OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(Error::Underflow {
        operation: format!("{} - {}", a, b),
    })
}

/// Fee in base units for `amount` at `fee_bps`, rounded down
pub fn fee_amount(amount: u128, fee_bps: u64) -> Result<u128> {
    let fee = dec_mul(amount_to_decimal(amount)?, bps_to_decimal(fee_bps))?;
    decimal_to_amount_floor(fee)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_amount_conversions() {
        assert_eq!(amount_to_decimal(1000).unwrap(), Decimal::from(1000));
        assert_eq!(decimal_to_amount_floor(d("999.999")).unwrap(), 999);
        assert_eq!(decimal_to_amount_floor(Decimal::ZERO).unwrap(), 0);
        assert!(decimal_to_amount_floor(d("-1")).is_err());
    }

    #[test]
    fn test_amount_overflow() {
        assert!(amount_to_decimal(u128::MAX).is_err());
    }

    #[test]
    fn test_bps() {
        assert_eq!(bps_to_decimal(50), d("0.005"));
        assert_eq!(bps_to_decimal(10_000), Decimal::ONE);
        assert_eq!(decimal_to_bps(d("0.7")), 7000);
        assert_eq!(decimal_to_bps(d("0.00009")), 0);
    }

    #[test]
    fn test_deviation() {
        assert_eq!(relative_deviation(d("0.98"), Decimal::ONE).unwrap(), d("0.02"));
        assert_eq!(signed_deviation(d("0.98"), Decimal::ONE).unwrap(), d("-0.02"));
        assert!(relative_deviation(Decimal::ONE, Decimal::ZERO).is_err());
    }

    #[test]
    fn test_mul_div_precision() {
        let share = dec_mul_div(Decimal::from(1000), Decimal::from(700), Decimal::from(1000)).unwrap();
        assert_eq!(share, Decimal::from(700));
    }

    #[test]
    fn test_safe_ops() {
        assert_eq!(safe_add(1, 2).unwrap(), 3);
        assert!(safe_add(u128::MAX, 1).is_err());
        assert!(safe_sub(1, 2).is_err());
    }

    #[test]
    fn test_fee_amount() {
        assert_eq!(fee_amount(10_000, 10).unwrap(), 10);
        assert_eq!(fee_amount(999, 10).unwrap(), 0);
        assert_eq!(fee_amount(1000, 0).unwrap(), 0);
    }
}
