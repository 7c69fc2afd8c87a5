//! Input validation utilities for the ssUSD module.
//!
//! These checks run before any state is touched.

use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, MODULE_ACCOUNT};

// ═══════════════════════════════════════════════════════════════════════════════
// AMOUNT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an amount is non-zero
pub fn validate_non_zero(amount: u128) -> Result<()> {
    if amount == 0 {
        return Err(Error::ZeroAmount);
    }
    Ok(())
}

/// Validate that an amount is non-zero and meets a configured minimum
pub fn validate_min_amount(amount: u128, minimum: u128) -> Result<()> {
    validate_non_zero(amount)?;

    if amount < minimum {
        return Err(Error::AmountBelowMinimum { amount, minimum });
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that a price is strictly positive
pub fn validate_price(subject: &str, price: Decimal) -> Result<()> {
    if price <= Decimal::ZERO {
        return Err(Error::InvalidPrice {
            subject: subject.to_string(),
            price,
        });
    }
    Ok(())
}

/// Validate a decimal weight lies in (0, 1]
pub fn validate_weight(name: &str, weight: Decimal) -> Result<()> {
    if weight <= Decimal::ZERO || weight > Decimal::ONE {
        return Err(Error::InvalidParameter {
            name: name.to_string(),
            reason: format!("weight {} must be in (0, 1]", weight),
        });
    }
    Ok(())
}

/// Validate a basis point value is at most 100%
pub fn validate_bps(name: &str, bps: u64) -> Result<()> {
    if bps > BPS_DIVISOR {
        return Err(Error::InvalidParameter {
            name: name.to_string(),
            reason: format!("{} bps exceeds {} bps", bps, BPS_DIVISOR),
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIER VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate an account address
pub fn validate_address(address: &str) -> Result<()> {
    if address.trim().is_empty() {
        return Err(Error::InvalidParameter {
            name: "address".into(),
            reason: "address cannot be empty".into(),
        });
    }
    Ok(())
}

/// Validate the account behind an issuance or redemption.
///
/// The module account and the fee collector hold module funds and cannot be
/// requesters.
pub fn validate_user_account(address: &str, fee_collector: &str) -> Result<()> {
    validate_address(address)?;
    if address == MODULE_ACCOUNT || address == fee_collector {
        return Err(Error::Unauthorized(format!(
            "{} is a module account and cannot issue or redeem",
            address
        )));
    }
    Ok(())
}

/// Validate a denom or identifier used inside a store key
pub fn validate_identifier(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidParameter {
            name: name.to_string(),
            reason: "cannot be empty".into(),
        });
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(Error::InvalidParameter {
            name: name.to_string(),
            reason: format!("'{}' contains invalid characters", value),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_validate_user_account() {
        assert!(validate_user_account("alice", "fees").is_ok());
        assert!(validate_user_account(" ", "fees").is_err());
        assert!(matches!(
            validate_user_account(MODULE_ACCOUNT, "fees"),
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            validate_user_account("fees", "fees"),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn test_validate_amounts() {
        assert_eq!(validate_non_zero(0), Err(Error::ZeroAmount));
        assert!(validate_min_amount(100, 100).is_ok());
        assert!(matches!(
            validate_min_amount(99, 100),
            Err(Error::AmountBelowMinimum { amount: 99, minimum: 100 })
        ));
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price("chainlink", Decimal::ONE).is_ok());
        assert!(validate_price("chainlink", Decimal::ZERO).is_err());
        assert!(validate_price("chainlink", Decimal::from_str("-0.5").unwrap()).is_err());
    }

    #[test]
    fn test_validate_weight() {
        assert!(validate_weight("w", Decimal::from_str("0.4").unwrap()).is_ok());
        assert!(validate_weight("w", Decimal::ZERO).is_err());
        assert!(validate_weight("w", Decimal::from(2)).is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("denom", "treasury_bill_token").is_ok());
        assert!(validate_identifier("denom", "").is_err());
        assert!(validate_identifier("denom", "bad/denom").is_err());
    }

    #[test]
    fn test_validate_bps() {
        assert!(validate_bps("fee", 10_000).is_ok());
        assert!(validate_bps("fee", 10_001).is_err());
    }
}
