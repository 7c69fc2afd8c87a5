//! In-memory balance keeper.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bank::BankKeeper;
use crate::core::stablecoin::Coin;
use crate::error::{Error, Result};
use crate::utils::constants::MODULE_ACCOUNT;
use crate::utils::math::{safe_add, safe_sub};

/// Balances and supplies held in ordered maps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryBank {
    /// account -> denom -> amount
    balances: BTreeMap<String, BTreeMap<String, u128>>,
    /// denom -> total supply
    supply: BTreeMap<String, u128>,
}

impl InMemoryBank {
    /// Create an empty bank
    pub fn new() -> Self {
        Self::default()
    }

    /// Create coins directly in `account` (genesis allocations, test funding)
    pub fn fund(&mut self, account: &str, coins: &[Coin]) -> Result<()> {
        for coin in coins {
            self.credit(account, &coin.denom, coin.amount)?;
            let supply = self.supply.entry(coin.denom.clone()).or_default();
            *supply = safe_add(*supply, coin.amount)?;
        }
        Ok(())
    }

    /// All non-zero balances of `account`
    pub fn balances_of(&self, account: &str) -> Vec<Coin> {
        self.balances
            .get(account)
            .map(|denoms| {
                denoms
                    .iter()
                    .filter(|(_, amount)| **amount > 0)
                    .map(|(denom, amount)| Coin::new(denom.clone(), *amount))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn credit(&mut self, account: &str, denom: &str, amount: u128) -> Result<()> {
        let balance = self
            .balances
            .entry(account.to_string())
            .or_default()
            .entry(denom.to_string())
            .or_default();
        *balance = safe_add(*balance, amount)?;
        Ok(())
    }

    pub(crate) fn debit(&mut self, account: &str, denom: &str, amount: u128) -> Result<()> {
        let available = self.balance(account, denom);
        if available < amount {
            return Err(Error::InsufficientFunds {
                denom: denom.to_string(),
                required: amount,
                available,
            });
        }
        if let Some(balance) = self
            .balances
            .get_mut(account)
            .and_then(|denoms| denoms.get_mut(denom))
        {
            *balance -= amount;
        }
        Ok(())
    }

    fn transfer(&mut self, from: &str, to: &str, coins: &[Coin]) -> Result<()> {
        for coin in coins {
            let available = self.balance(from, &coin.denom);
            if available < coin.amount {
                return Err(Error::InsufficientFunds {
                    denom: coin.denom.clone(),
                    required: coin.amount,
                    available,
                });
            }
        }
        for coin in coins {
            self.debit(from, &coin.denom, coin.amount)?;
            self.credit(to, &coin.denom, coin.amount)?;
        }
        Ok(())
    }
}

impl BankKeeper for InMemoryBank {
    fn balance(&self, account: &str, denom: &str) -> u128 {
        self.balances
            .get(account)
            .and_then(|denoms| denoms.get(denom))
            .copied()
            .unwrap_or(0)
    }

    fn supply_of(&self, denom: &str) -> u128 {
        self.supply.get(denom).copied().unwrap_or(0)
    }

    fn send_to_module(&mut self, account: &str, coins: &[Coin]) -> Result<()> {
        self.transfer(account, MODULE_ACCOUNT, coins)
    }

    fn send_from_module(&mut self, account: &str, coins: &[Coin]) -> Result<()> {
        self.transfer(MODULE_ACCOUNT, account, coins)
    }

    fn mint(&mut self, coins: &[Coin]) -> Result<()> {
        self.fund(MODULE_ACCOUNT, coins)
    }

    fn burn(&mut self, coins: &[Coin]) -> Result<()> {
        for coin in coins {
            self.debit(MODULE_ACCOUNT, &coin.denom, coin.amount)?;
            let supply = self.supply.entry(coin.denom.clone()).or_default();
            *supply = safe_sub(*supply, coin.amount)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fund_and_balance() {
        let mut bank = InMemoryBank::new();
        bank.fund("alice", &[Coin::new("mmf_token", 500)]).unwrap();

        assert_eq!(bank.balance("alice", "mmf_token"), 500);
        assert_eq!(bank.supply_of("mmf_token"), 500);
        assert_eq!(bank.balance("bob", "mmf_token"), 0);
    }

    #[test]
    fn test_module_custody() {
        let mut bank = InMemoryBank::new();
        bank.fund("alice", &[Coin::new("repo_token", 100)]).unwrap();

        bank.send_to_module("alice", &[Coin::new("repo_token", 60)]).unwrap();
        assert_eq!(bank.balance(MODULE_ACCOUNT, "repo_token"), 60);

        bank.send_from_module("bob", &[Coin::new("repo_token", 10)]).unwrap();
        assert_eq!(bank.balance("bob", "repo_token"), 10);
        assert_eq!(bank.balance(MODULE_ACCOUNT, "repo_token"), 50);
    }

    #[test]
    fn test_insufficient_funds_is_atomic() {
        let mut bank = InMemoryBank::new();
        bank.fund("alice", &[Coin::new("a", 10), Coin::new("b", 1)]).unwrap();

        let err = bank
            .send_to_module("alice", &[Coin::new("a", 5), Coin::new("b", 2)])
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { required: 2, available: 1, .. }));
        assert_eq!(bank.balance("alice", "a"), 10);
    }

    #[test]
    fn test_mint_and_burn() {
        let mut bank = InMemoryBank::new();
        bank.mint(&[Coin::ssusd(1000)]).unwrap();
        assert_eq!(bank.supply_of("ssusd"), 1000);

        bank.burn(&[Coin::ssusd(400)]).unwrap();
        assert_eq!(bank.supply_of("ssusd"), 600);
        assert!(bank.burn(&[Coin::ssusd(601)]).is_err());
    }

    #[test]
    fn test_balances_of() {
        let mut bank = InMemoryBank::new();
        bank.fund("alice", &[Coin::new("b", 2), Coin::new("a", 1)]).unwrap();
        assert_eq!(bank.balances_of("alice"), vec![Coin::new("a", 1), Coin::new("b", 2)]);
        assert!(bank.balances_of("nobody").is_empty());
    }
}
