//! # ssUSD Module
//!
//! Ledger-state module for ssUSD, a reserve-backed digital dollar. The module
//! aggregates external price observations, watches the peg, signals
//! stability actions, and issues and redeems ssUSD 1:1 against a
//! conservative reserve of tokenized cash-equivalent assets.
//!
//! ## Architecture
//!
//! - **Oracle**: Registered price feeds and the confidence-weighted price
//! - **Peg**: PID controller and the {Stable, Deviated, Rebalancing} state machine
//! - **Reserve**: Asset classes, target allocations and reserve valuation
//! - **Issuance / Redemption**: 1:1 minting and preferred or proportional payout
//! - **Bank**: The balance capability supplied by the host ledger
//! - **Protocol**: Messages, queries, events and the atomic state machine
//!
//! ## Example
//!
//! ```rust,ignore
//! use ssusd::prelude::*;
//!
//! let mut module = SsusdModule::new(InMemoryStore::new(), InMemoryBank::new());
//! module.init_genesis(&GenesisState::default())?;
//!
//! module.begin_block(1, block_time)?;
//! module.execute(Msg::Issue(MsgIssue {
//!     requester: "alice".into(),
//!     amount: 1000,
//!     reserve_payment: vec![Coin::new("treasury_bill_token", 1000)],
//! }))?;
//! let events = module.end_block()?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod bank;
pub mod cli;
pub mod core;
pub mod error;
pub mod issuance;
pub mod oracle;
pub mod peg;
pub mod protocol;
pub mod redemption;
pub mod reserve;
pub mod storage;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bank::{BankKeeper, CacheBank, InMemoryBank};
    pub use crate::core::{
        config::{AllocationPolicy, ModuleParams, PidConfig},
        context::BlockContext,
        genesis::GenesisState,
        stablecoin::{Coin, Stablecoin},
    };
    pub use crate::error::{Error, Result};
    pub use crate::issuance::IssuanceEngine;
    pub use crate::oracle::{
        aggregator::PriceAggregator,
        price_feed::{FeedRegistration, PriceFeed},
    };
    pub use crate::peg::{PegController, PegStatus, RebalanceAction};
    pub use crate::protocol::{
        EventLog, ModuleEvent, Msg, MsgIssue, MsgRedeem, MsgResponse, MsgUpdatePrice, Query,
        QueryResponse, SsusdModule,
    };
    pub use crate::redemption::RedemptionEngine;
    pub use crate::reserve::{AssetPricing, ReserveLedger};
    pub use crate::storage::{
        backend::{FileStore, InMemoryStore, StorageBackend},
        state::StateManager,
    };
}

/// Module version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Module name
pub const MODULE_NAME: &str = "ssusd";
