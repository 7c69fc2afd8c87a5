//! Genesis state.
//!
//! The initial contents of the module store: parameters, registered price
//! feeds, reserve asset classes and the ssUSD supply record. The default
//! genesis reproduces the reference deployment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::config::ModuleParams;
use crate::core::stablecoin::{validate_coins, Coin, Stablecoin};
use crate::error::{Error, Result};
use crate::oracle::price_feed::{default_feeds, PriceFeed};
use crate::reserve::ledger::{default_reserve_classes, validate_class_set, ReserveAssetClass};
use crate::utils::constants::SSUSD_DENOM;
use crate::utils::validation::validate_address;

/// Initial balance created at genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisBalance {
    /// Account receiving the coins
    pub account: String,
    /// Coins created in the account
    pub coins: Vec<Coin>,
}

/// Full initial state of the module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    /// Module parameters
    pub params: ModuleParams,
    /// Registered price feeds
    pub feeds: Vec<PriceFeed>,
    /// Reserve asset classes in redemption order
    pub reserve_classes: Vec<ReserveAssetClass>,
    /// ssUSD supply record
    pub stablecoin: Stablecoin,
    /// Balances handed to the bank at genesis (reserve tokens for test accounts)
    #[serde(default)]
    pub balances: Vec<GenesisBalance>,
}

impl Default for GenesisState {
    fn default() -> Self {
        let params = ModuleParams::default();
        Self {
            feeds: default_feeds(params.target_price),
            reserve_classes: default_reserve_classes(),
            stablecoin: Stablecoin::default(),
            balances: Vec::new(),
            params,
        }
    }
}

impl GenesisState {
    /// Add a genesis balance
    pub fn with_balance(mut self, account: impl Into<String>, coins: Vec<Coin>) -> Self {
        self.balances.push(GenesisBalance {
            account: account.into(),
            coins,
        });
        self
    }

    /// Validate the whole genesis
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        validate_class_set(&self.reserve_classes)?;

        let mut sources = BTreeSet::new();
        for feed in &self.feeds {
            feed.validate()?;
            if !sources.insert(feed.source.as_str()) {
                return Err(Error::FeedAlreadyExists(feed.source.clone()));
            }
        }

        if self.stablecoin.denom != SSUSD_DENOM {
            return Err(Error::InvalidParameter {
                name: "stablecoin.denom".into(),
                reason: format!("expected {}, got {}", SSUSD_DENOM, self.stablecoin.denom),
            });
        }
        if self.stablecoin.total_supply > self.stablecoin.max_supply {
            return Err(Error::SupplyCapExceeded {
                resulting: self.stablecoin.total_supply,
                max: self.stablecoin.max_supply,
            });
        }
        // Supply can only be created by issuance against reserves
        if self.stablecoin.total_supply != 0 {
            return Err(Error::InvalidParameter {
                name: "stablecoin.total_supply".into(),
                reason: "genesis supply must be zero".into(),
            });
        }
        if self.reserve_classes.iter().any(|c| c.units != 0) {
            return Err(Error::InvalidParameter {
                name: "reserve_classes".into(),
                reason: "genesis reserve must be empty".into(),
            });
        }

        for balance in &self.balances {
            validate_address(&balance.account)?;
            validate_coins(&balance.coins)?;
            if balance.coins.iter().any(|c| c.denom == self.stablecoin.denom) {
                return Err(Error::InvalidParameter {
                    name: "balances".into(),
                    reason: format!("{} cannot be allocated at genesis", self.stablecoin.denom),
                });
            }
        }

        Ok(())
    }
}
