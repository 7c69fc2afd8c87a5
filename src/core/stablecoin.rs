//! ssUSD supply record and coin types.
//!
//! This module implements:
//! - `Coin`: an integer amount of a denom
//! - `Stablecoin`: the persisted supply record for ssUSD
//!
//! The supply record is only ever mutated by issuance (increase) and
//! redemption (decrease).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::constants::{DEFAULT_MAX_SUPPLY, SSUSD_DENOM};
use crate::utils::math::{safe_add, safe_sub};
use crate::utils::validation::validate_identifier;

// ═══════════════════════════════════════════════════════════════════════════════
// COIN
// ═══════════════════════════════════════════════════════════════════════════════

/// An amount of a single denom, in integer base units
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coin {
    /// Denomination
    pub denom: String,
    /// Amount in base units
    pub amount: u128,
}

impl Coin {
    /// Create a new coin
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// Create an ssUSD coin
    pub fn ssusd(amount: u128) -> Self {
        Self::new(SSUSD_DENOM, amount)
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Render a list of coins as `100a,200b`
pub fn format_coins(coins: &[Coin]) -> String {
    coins
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Validate a payment: non-empty, no zero amounts, no repeated denoms
pub fn validate_coins(coins: &[Coin]) -> Result<()> {
    if coins.is_empty() {
        return Err(Error::InvalidParameter {
            name: "coins".into(),
            reason: "at least one coin is required".into(),
        });
    }

    let mut seen = BTreeSet::new();
    for coin in coins {
        validate_identifier("denom", &coin.denom)?;
        if coin.is_zero() {
            return Err(Error::ZeroAmount);
        }
        if !seen.insert(coin.denom.as_str()) {
            return Err(Error::InvalidParameter {
                name: "coins".into(),
                reason: format!("duplicate denom {}", coin.denom),
            });
        }
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABLECOIN
// ═══════════════════════════════════════════════════════════════════════════════

/// Persisted supply record for a stablecoin denom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stablecoin {
    /// Denomination
    pub denom: String,
    /// Outstanding supply in base units
    pub total_supply: u128,
    /// Maximum supply in base units
    pub max_supply: u128,
    /// Whether issuance and redemption are enabled
    pub active: bool,
}

impl Default for Stablecoin {
    fn default() -> Self {
        Self {
            denom: SSUSD_DENOM.to_string(),
            total_supply: 0,
            max_supply: DEFAULT_MAX_SUPPLY,
            active: true,
        }
    }
}

impl Stablecoin {
    /// Fail unless the stablecoin is active
    pub fn ensure_active(&self) -> Result<()> {
        if !self.active {
            return Err(Error::StablecoinInactive(self.denom.clone()));
        }
        Ok(())
    }

    /// Remaining headroom under the supply cap
    pub fn headroom(&self) -> u128 {
        self.max_supply.saturating_sub(self.total_supply)
    }

    /// Increase supply, enforcing the cap
    pub fn increase_supply(&mut self, amount: u128) -> Result<()> {
        let resulting = safe_add(self.total_supply, amount)?;
        if resulting > self.max_supply {
            return Err(Error::SupplyCapExceeded {
                resulting,
                max: self.max_supply,
            });
        }
        self.total_supply = resulting;
        Ok(())
    }

    /// Decrease supply
    pub fn decrease_supply(&mut self, amount: u128) -> Result<()> {
        self.total_supply = safe_sub(self.total_supply, amount)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_display() {
        assert_eq!(Coin::new("mmf_token", 75).to_string(), "75mmf_token");
        assert_eq!(
            format_coins(&[Coin::new("a", 1), Coin::new("b", 2)]),
            "1a,2b"
        );
    }

    #[test]
    fn test_validate_coins() {
        assert!(validate_coins(&[Coin::new("repo_token", 5)]).is_ok());
        assert!(validate_coins(&[]).is_err());
        assert_eq!(validate_coins(&[Coin::new("repo_token", 0)]), Err(Error::ZeroAmount));
        assert!(validate_coins(&[Coin::new("x", 1), Coin::new("x", 2)]).is_err());
    }

    #[test]
    fn test_supply_cap() {
        let mut coin = Stablecoin {
            max_supply: 1000,
            ..Default::default()
        };

        coin.increase_supply(600).unwrap();
        assert_eq!(coin.headroom(), 400);

        assert!(matches!(
            coin.increase_supply(500),
            Err(Error::SupplyCapExceeded { resulting: 1100, max: 1000 })
        ));
        // Failed increase leaves supply untouched
        assert_eq!(coin.total_supply, 600);

        coin.decrease_supply(600).unwrap();
        assert!(coin.decrease_supply(1).is_err());
    }

    #[test]
    fn test_inactive() {
        let coin = Stablecoin {
            active: false,
            ..Default::default()
        };
        assert_eq!(coin.ensure_active(), Err(Error::StablecoinInactive("ssusd".into())));
    }
}
