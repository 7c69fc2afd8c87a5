//! Journaling overlay over a balance keeper.
//!
//! A [`CacheBank`] answers reads from its own overlay first and the parent
//! keeper second, and records every mutation in a journal. The journal is
//! replayed on the parent only after the whole transaction has succeeded;
//! dropping the overlay discards everything.

use std::collections::BTreeMap;

use crate::bank::BankKeeper;
use crate::core::stablecoin::Coin;
use crate::error::{Error, Result};
use crate::utils::constants::MODULE_ACCOUNT;
use crate::utils::math::{safe_add, safe_sub};

/// One recorded balance mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankOp {
    /// Account to module custody
    SendToModule {
        /// Sender
        account: String,
        /// Coins moved
        coins: Vec<Coin>,
    },
    /// Module custody to account
    SendFromModule {
        /// Recipient
        account: String,
        /// Coins moved
        coins: Vec<Coin>,
    },
    /// New coins in module custody
    Mint(Vec<Coin>),
    /// Coins destroyed from module custody
    Burn(Vec<Coin>),
}

/// Ordered list of mutations ready to be applied to a parent keeper
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankJournal {
    ops: Vec<BankOp>,
}

impl BankJournal {
    /// Recorded operations in order
    pub fn ops(&self) -> &[BankOp] {
        &self.ops
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Replay every operation on `bank`
    pub fn apply<K: BankKeeper + ?Sized>(self, bank: &mut K) -> Result<()> {
        for op in self.ops {
            match op {
                BankOp::SendToModule { account, coins } => bank.send_to_module(&account, &coins)?,
                BankOp::SendFromModule { account, coins } => {
                    bank.send_from_module(&account, &coins)?
                }
                BankOp::Mint(coins) => bank.mint(&coins)?,
                BankOp::Burn(coins) => bank.burn(&coins)?,
            }
        }
        Ok(())
    }
}

/// Transaction-scoped view of a balance keeper
pub struct CacheBank<'a, K: BankKeeper + ?Sized> {
    parent: &'a K,
    balances: BTreeMap<(String, String), u128>,
    supply: BTreeMap<String, u128>,
    journal: BankJournal,
}

impl<'a, K: BankKeeper + ?Sized> CacheBank<'a, K> {
    /// Create an empty overlay on `parent`
    pub fn new(parent: &'a K) -> Self {
        Self {
            parent,
            balances: BTreeMap::new(),
            supply: BTreeMap::new(),
            journal: BankJournal::default(),
        }
    }

    /// Consume the overlay, keeping only its journal
    pub fn into_journal(self) -> BankJournal {
        self.journal
    }

    fn set_balance(&mut self, account: &str, denom: &str, amount: u128) {
        self.balances
            .insert((account.to_string(), denom.to_string()), amount);
    }

    fn move_coins(&mut self, from: &str, to: &str, coins: &[Coin]) -> Result<()> {
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
            let from_balance = safe_sub(self.balance(from, &coin.denom), coin.amount)?;
            self.set_balance(from, &coin.denom, from_balance);
            let to_balance = safe_add(self.balance(to, &coin.denom), coin.amount)?;
            self.set_balance(to, &coin.denom, to_balance);
        }
        Ok(())
    }
}

impl<'a, K: BankKeeper + ?Sized> BankKeeper for CacheBank<'a, K> {
    fn balance(&self, account: &str, denom: &str) -> u128 {
        self.balances
            .get(&(account.to_string(), denom.to_string()))
            .copied()
            .unwrap_or_else(|| self.parent.balance(account, denom))
    }

    fn supply_of(&self, denom: &str) -> u128 {
        self.supply
            .get(denom)
            .copied()
            .unwrap_or_else(|| self.parent.supply_of(denom))
    }

    fn send_to_module(&mut self, account: &str, coins: &[Coin]) -> Result<()> {
        self.move_coins(account, MODULE_ACCOUNT, coins)?;
        self.journal.ops.push(BankOp::SendToModule {
            account: account.to_string(),
            coins: coins.to_vec(),
        });
        Ok(())
    }

    fn send_from_module(&mut self, account: &str, coins: &[Coin]) -> Result<()> {
        self.move_coins(MODULE_ACCOUNT, account, coins)?;
        self.journal.ops.push(BankOp::SendFromModule {
            account: account.to_string(),
            coins: coins.to_vec(),
        });
        Ok(())
    }

    fn mint(&mut self, coins: &[Coin]) -> Result<()> {
        for coin in coins {
            let balance = safe_add(self.balance(MODULE_ACCOUNT, &coin.denom), coin.amount)?;
            self.set_balance(MODULE_ACCOUNT, &coin.denom, balance);
            let supply = safe_add(self.supply_of(&coin.denom), coin.amount)?;
            self.supply.insert(coin.denom.clone(), supply);
        }
        self.journal.ops.push(BankOp::Mint(coins.to_vec()));
        Ok(())
    }

    fn burn(&mut self, coins: &[Coin]) -> Result<()> {
        for coin in coins {
            let available = self.balance(MODULE_ACCOUNT, &coin.denom);
            if available < coin.amount {
                return Err(Error::InsufficientFunds {
                    denom: coin.denom.clone(),
                    required: coin.amount,
                    available,
                });
            }
        }
        for coin in coins {
            let balance = safe_sub(self.balance(MODULE_ACCOUNT, &coin.denom), coin.amount)?;
            self.set_balance(MODULE_ACCOUNT, &coin.denom, balance);
            let supply = safe_sub(self.supply_of(&coin.denom), coin.amount)?;
            self.supply.insert(coin.denom.clone(), supply);
        }
        self.journal.ops.push(BankOp::Burn(coins.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::InMemoryBank;

    fn funded() -> InMemoryBank {
        let mut bank = InMemoryBank::new();
        bank.fund("alice", &[Coin::new("treasury_bill_token", 1000)]).unwrap();
        bank
    }

    #[test]
    fn test_reads_fall_through() {
        let bank = funded();
        let cache = CacheBank::new(&bank);
        assert_eq!(cache.balance("alice", "treasury_bill_token"), 1000);
        assert_eq!(cache.supply_of("treasury_bill_token"), 1000);
    }

    #[test]
    fn test_discard_leaves_parent_untouched() {
        let bank = funded();
        {
            let mut cache = CacheBank::new(&bank);
            cache
                .send_to_module("alice", &[Coin::new("treasury_bill_token", 1000)])
                .unwrap();
            cache.mint(&[Coin::ssusd(1000)]).unwrap();
            assert_eq!(cache.balance("alice", "treasury_bill_token"), 0);
            assert_eq!(cache.supply_of("ssusd"), 1000);
        }
        assert_eq!(bank.balance("alice", "treasury_bill_token"), 1000);
        assert_eq!(bank.supply_of("ssusd"), 0);
    }

    #[test]
    fn test_journal_replay_matches_overlay() {
        let mut bank = funded();

        let journal = {
            let mut cache = CacheBank::new(&bank);
            cache
                .send_to_module("alice", &[Coin::new("treasury_bill_token", 1000)])
                .unwrap();
            cache.mint(&[Coin::ssusd(1000)]).unwrap();
            cache.send_from_module("alice", &[Coin::ssusd(1000)]).unwrap();
            cache.into_journal()
        };
        assert_eq!(journal.ops().len(), 3);

        journal.apply(&mut bank).unwrap();
        assert_eq!(bank.balance("alice", "ssusd"), 1000);
        assert_eq!(bank.balance(MODULE_ACCOUNT, "treasury_bill_token"), 1000);
        assert_eq!(bank.supply_of("ssusd"), 1000);
    }

    #[test]
    fn test_failed_op_not_journaled() {
        let bank = funded();
        let mut cache = CacheBank::new(&bank);
        assert!(cache.burn(&[Coin::ssusd(1)]).is_err());
        assert!(cache.into_journal().is_empty());
    }
}
