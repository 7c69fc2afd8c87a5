//! Core types for the ssUSD module.
//!
//! This module contains the fundamental building blocks:
//! - Module parameters and allocation policy
//! - Block context supplied by the host ledger
//! - Genesis state
//! - Coins and the ssUSD supply record

pub mod config;
pub mod context;
pub mod genesis;
pub mod stablecoin;

pub use config::*;
pub use context::*;
pub use genesis::*;
pub use stablecoin::*;
