//! Reserve asset pricing.

use rust_decimal::Decimal;

use crate::core::stablecoin::Coin;
use crate::error::Result;
use crate::utils::math::{amount_to_decimal, dec_add, dec_mul};

/// Source of USD prices for reserve asset denoms
pub trait AssetPricing {
    /// USD price of one base unit of `denom`.
    ///
    /// Fails with `InvalidAssetClass` for denoms that are not reserve assets.
    fn price_of(&self, denom: &str) -> Result<Decimal>;

    /// USD value of a list of coins
    fn value_of(&self, coins: &[Coin]) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        for coin in coins {
            let value = dec_mul(amount_to_decimal(coin.amount)?, self.price_of(&coin.denom)?)?;
            total = dec_add(total, value)?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct FixedPrices;

    impl AssetPricing for FixedPrices {
        fn price_of(&self, denom: &str) -> Result<Decimal> {
            match denom {
                "treasury_bill_token" => Ok(Decimal::ONE),
                "repo_token" => Ok(Decimal::new(99, 2)),
                other => Err(Error::InvalidAssetClass(other.to_string())),
            }
        }
    }

    #[test]
    fn test_value_of() {
        let value = FixedPrices
            .value_of(&[Coin::new("treasury_bill_token", 1000), Coin::new("repo_token", 100)])
            .unwrap();
        assert_eq!(value, Decimal::from(1099));
    }

    #[test]
    fn test_value_of_unknown_denom() {
        let err = FixedPrices.value_of(&[Coin::new("doge", 1)]).unwrap_err();
        assert_eq!(err, Error::InvalidAssetClass("doge".into()));
    }
}
