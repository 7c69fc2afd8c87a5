//! Ledger balance service.
//!
//! The module never owns balances itself: custody, minting and burning are
//! delegated to a [`BankKeeper`] supplied by the host ledger. This module
//! defines that capability plus two implementations:
//! - [`InMemoryBank`]: a self-contained keeper for tests and the replay binary
//! - [`CacheBank`]: a journaling overlay that makes one transaction atomic

pub mod cache;
pub mod memory;

pub use cache::*;
pub use memory::*;

use crate::core::stablecoin::Coin;
use crate::error::Result;

/// Balance capability consumed by the module
pub trait BankKeeper {
    /// Balance of `account` in `denom`
    fn balance(&self, account: &str, denom: &str) -> u128;

    /// Total supply of `denom`
    fn supply_of(&self, denom: &str) -> u128;

    /// Move coins from `account` into module custody
    fn send_to_module(&mut self, account: &str, coins: &[Coin]) -> Result<()>;

    /// Move coins from module custody to `account`
    fn send_from_module(&mut self, account: &str, coins: &[Coin]) -> Result<()>;

    /// Create coins in module custody
    fn mint(&mut self, coins: &[Coin]) -> Result<()>;

    /// Destroy coins held in module custody
    fn burn(&mut self, coins: &[Coin]) -> Result<()>;
}
