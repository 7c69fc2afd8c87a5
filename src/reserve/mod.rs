//! Reserve backing for ssUSD.
//!
//! This module tracks the conservative reserve:
//! - Asset classes with target allocations summing to 100%
//! - Units held per class and their USD prices
//! - Deposit, withdrawal and allocation policy checks

pub mod ledger;
pub mod pricing;

pub use ledger::*;
pub use pricing::*;
