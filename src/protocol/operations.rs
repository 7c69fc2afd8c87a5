//! Module messages and queries.
//!
//! A message is one transaction delivered by the host ledger. Each message
//! names its signer; governance messages additionally require the signer to
//! be the module authority. Queries are read-only and never touch the bank.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::config::ModuleParams;
use crate::core::stablecoin::{Coin, Stablecoin};
use crate::issuance::engine::IssueReceipt;
use crate::oracle::price_feed::{FeedRegistration, PriceFeed};
use crate::peg::controller::{ControllerState, PegOutcome, PegStatus, RebalanceEvent};
use crate::redemption::engine::RedeemReceipt;
use crate::reserve::ledger::{ReserveAssetClass, ReserveComposition};

// ═══════════════════════════════════════════════════════════════════════════════
// MESSAGES
// ═══════════════════════════════════════════════════════════════════════════════

/// Report a price observation for a registered feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdatePrice {
    /// Reporting account
    pub reporter: String,
    /// Feed source
    pub source: String,
    /// Observed price
    pub price: Decimal,
    /// Observation time; block time when absent
    #[serde(default)]
    pub observed_at: Option<u64>,
}

/// Mint ssUSD against a reserve deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgIssue {
    /// Depositing account
    pub requester: String,
    /// ssUSD to mint
    pub amount: u128,
    /// Reserve assets deposited
    pub reserve_payment: Vec<Coin>,
}

/// Burn ssUSD for reserve assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRedeem {
    /// Redeeming account
    pub requester: String,
    /// ssUSD to burn
    pub amount: u128,
    /// Denom or class id to be paid in; empty or absent means proportional
    #[serde(default)]
    pub preferred_asset: Option<String>,
}

impl MsgRedeem {
    /// Preferred asset with the empty string treated as absent
    pub fn preferred(&self) -> Option<&str> {
        self.preferred_asset
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Register a new price feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRegisterFeed {
    /// Module authority
    pub authority: String,
    /// Feed definition
    pub feed: FeedRegistration,
}

/// Set the USD price of a reserve asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSetAssetPrice {
    /// Module authority
    pub authority: String,
    /// Reserve asset denom
    pub denom: String,
    /// Unit price
    pub price: Decimal,
}

/// Replace module parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateParams {
    /// Module authority
    pub authority: String,
    /// New parameter set
    pub params: ModuleParams,
}

/// Toggle emergency mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSetEmergencyMode {
    /// Module authority
    pub authority: String,
    /// New value
    pub enabled: bool,
}

/// All module messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Msg {
    /// Price observation
    UpdatePrice(MsgUpdatePrice),
    /// Issuance
    Issue(MsgIssue),
    /// Redemption
    Redeem(MsgRedeem),
    /// Feed registration
    RegisterFeed(MsgRegisterFeed),
    /// Reserve asset repricing
    SetAssetPrice(MsgSetAssetPrice),
    /// Parameter update
    UpdateParams(MsgUpdateParams),
    /// Emergency mode toggle
    SetEmergencyMode(MsgSetEmergencyMode),
}

impl Msg {
    /// Get the message type name
    pub fn msg_type(&self) -> &'static str {
        match self {
            Self::UpdatePrice(_) => "update_price",
            Self::Issue(_) => "issue",
            Self::Redeem(_) => "redeem",
            Self::RegisterFeed(_) => "register_feed",
            Self::SetAssetPrice(_) => "set_asset_price",
            Self::UpdateParams(_) => "update_params",
            Self::SetEmergencyMode(_) => "set_emergency_mode",
        }
    }

    /// Account that signed the message
    pub fn signer(&self) -> &str {
        match self {
            Self::UpdatePrice(m) => &m.reporter,
            Self::Issue(m) => &m.requester,
            Self::Redeem(m) => &m.requester,
            Self::RegisterFeed(m) => &m.authority,
            Self::SetAssetPrice(m) => &m.authority,
            Self::UpdateParams(m) => &m.authority,
            Self::SetEmergencyMode(m) => &m.authority,
        }
    }

    /// Whether the message changes supply and must preserve backing
    pub fn touches_supply(&self) -> bool {
        matches!(self, Self::Issue(_) | Self::Redeem(_))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESPONSES
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of an accepted price observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdateResult {
    /// Feed after the update
    pub feed: PriceFeed,
    /// Weighted price after the update
    pub weighted_price: Decimal,
    /// Peg controller reaction
    pub peg: PegOutcome,
}

/// Successful message results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgResponse {
    /// Price accepted
    PriceUpdated(PriceUpdateResult),
    /// ssUSD issued
    Issued(IssueReceipt),
    /// ssUSD redeemed
    Redeemed(RedeemReceipt),
    /// Feed registered
    FeedRegistered(PriceFeed),
    /// Reserve asset repriced
    AssetPriceSet(ReserveAssetClass),
    /// Parameters replaced
    ParamsUpdated(ModuleParams),
    /// Emergency mode toggled
    EmergencyModeSet {
        /// New value
        enabled: bool,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// QUERIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    /// Current ssUSD price and peg status
    Price,
    /// Reserve composition report
    ReserveComposition,
    /// Supply record
    Stablecoin,
    /// All registered feeds
    Feeds,
    /// Peg controller state
    ControllerState,
    /// Rebalance history, most recent `limit` entries
    RebalanceHistory {
        /// Entries to return; all when absent
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Module parameters
    Params,
    /// Bank balance of an account
    Balance {
        /// Account
        account: String,
        /// Denom
        denom: String,
    },
}

/// Price query result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceInfo {
    /// Weighted price, or target when no feed is fresh
    pub price: Decimal,
    /// Peg target
    pub target: Decimal,
    /// Signed deviation from target
    pub deviation: Decimal,
    /// Feeds contributing to the price
    pub source_count: usize,
    /// Peg status
    pub status: PegStatus,
    /// Whether emergency mode pins the price
    pub emergency_mode: bool,
}

/// Query results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryResponse {
    /// Price
    Price(PriceInfo),
    /// Reserve composition
    ReserveComposition(ReserveComposition),
    /// Supply record
    Stablecoin(Stablecoin),
    /// Registered feeds
    Feeds {
        /// Feeds in source order
        feeds: Vec<PriceFeed>,
    },
    /// Controller state
    ControllerState(ControllerState),
    /// Rebalance history
    RebalanceHistory {
        /// Events, oldest first
        events: Vec<RebalanceEvent>,
    },
    /// Parameters
    Params(ModuleParams),
    /// Balance
    Balance(Coin),
}
