//! Module events for state change notifications.
//!
//! Every committed transaction emits events describing what it changed.
//! The host ledger receives them as `(name, attributes)` pairs; the full
//! typed payload is kept for the replay binary and for tests.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::context::BlockContext;
use crate::core::stablecoin::format_coins;
use crate::error::{Error, Result};
use crate::issuance::engine::IssueReceipt;
use crate::peg::controller::{PegStatus, RebalanceEvent};
use crate::redemption::engine::{Payout, RedeemReceipt};

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All module event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleEvent {
    // Oracle Events
    /// Observation accepted
    PriceUpdated(PriceUpdatedEvent),
    /// New feed registered
    FeedRegistered(FeedRegisteredEvent),
    /// Feed aged out and stopped contributing
    FeedDeactivated(FeedDeactivatedEvent),

    // Peg Events
    /// Peg status changed
    PegStatusChanged(PegStatusChangedEvent),
    /// Controller step recorded
    Rebalance(RebalanceEvent),

    // Supply Events
    /// ssUSD issued against reserves
    Issued(IssueReceipt),
    /// ssUSD redeemed for reserves
    Redeemed(RedeemReceipt),

    // Governance Events
    /// Reserve asset repriced
    AssetPriceSet(AssetPriceSetEvent),
    /// Parameters replaced
    ParamsUpdated(ParamsUpdatedEvent),
    /// Emergency mode toggled
    EmergencyModeSet(EmergencyModeEvent),
}

impl ModuleEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PriceUpdated(_) => "price_updated",
            Self::FeedRegistered(_) => "feed_registered",
            Self::FeedDeactivated(_) => "feed_deactivated",
            Self::PegStatusChanged(_) => "peg_status_changed",
            Self::Rebalance(_) => "rebalance",
            Self::Issued(_) => "issue",
            Self::Redeemed(_) => "redeem",
            Self::AssetPriceSet(_) => "asset_price_set",
            Self::ParamsUpdated(_) => "params_updated",
            Self::EmergencyModeSet(_) => "emergency_mode_set",
        }
    }

    /// Flat key/value attributes
    pub fn attributes(&self) -> Vec<(String, String)> {
        fn attr(key: &str, value: impl ToString) -> (String, String) {
            (key.to_string(), value.to_string())
        }

        match self {
            Self::PriceUpdated(e) => vec![
                attr("source", &e.source),
                attr("price", e.price),
                attr("weighted_price", e.weighted_price),
                attr("deviation", e.deviation),
            ],
            Self::FeedRegistered(e) => vec![
                attr("source", &e.source),
                attr("weight", e.weight),
                attr("deviation_limit_bps", e.deviation_limit_bps),
                attr("update_frequency_secs", e.update_frequency_secs),
            ],
            Self::FeedDeactivated(e) => vec![
                attr("source", &e.source),
                attr("last_update", e.last_update),
            ],
            Self::PegStatusChanged(e) => vec![
                attr("from", e.from),
                attr("to", e.to),
                attr("price", e.price),
                attr("deviation", e.deviation),
            ],
            Self::Rebalance(e) => vec![
                attr("seq", e.seq),
                attr("price_before", e.price_before),
                attr("price_target", e.price_target),
                attr("deviation", e.deviation),
                attr("control_output", e.control_output),
                attr("action", e.action),
                attr("amount", e.amount),
                attr("reason", &e.reason),
            ],
            Self::Issued(r) => vec![
                attr("requester", &r.requester),
                attr("amount", r.amount),
                attr("fee", r.fee),
                attr("reserve_payment", format_coins(&r.payment)),
                attr("reserve_value", r.payment_value),
                attr("total_supply", r.total_supply),
            ],
            Self::Redeemed(r) => {
                let coins: Vec<_> = r.payouts.iter().map(Payout::coin).collect();
                vec![
                    attr("requester", &r.requester),
                    attr("amount", r.amount),
                    attr("fee", r.fee),
                    attr("payout", format_coins(&coins)),
                    attr("payout_value", r.payout_value),
                    attr("total_supply", r.total_supply),
                ]
            }
            Self::AssetPriceSet(e) => vec![attr("denom", &e.denom), attr("price", e.price)],
            Self::ParamsUpdated(e) => vec![attr("authority", &e.authority)],
            Self::EmergencyModeSet(e) => vec![attr("enabled", e.enabled)],
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT PAYLOADS
// ═══════════════════════════════════════════════════════════════════════════════

/// Accepted price observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdatedEvent {
    /// Feed source
    pub source: String,
    /// Reported price
    pub price: Decimal,
    /// Weighted price after the update
    pub weighted_price: Decimal,
    /// Signed deviation of the weighted price from target
    pub deviation: Decimal,
}

/// New feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRegisteredEvent {
    /// Feed source
    pub source: String,
    /// Confidence weight
    pub weight: Decimal,
    /// Tolerance in bps
    pub deviation_limit_bps: u64,
    /// Freshness window
    pub update_frequency_secs: u64,
}

/// Feed marked inactive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDeactivatedEvent {
    /// Feed source
    pub source: String,
    /// Time of its last accepted observation
    pub last_update: u64,
}

/// Peg status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PegStatusChangedEvent {
    /// Previous status
    pub from: PegStatus,
    /// New status
    pub to: PegStatus,
    /// Weighted price
    pub price: Decimal,
    /// Signed deviation from target
    pub deviation: Decimal,
}

/// Reserve asset repriced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPriceSetEvent {
    /// Asset denom
    pub denom: String,
    /// New unit price
    pub price: Decimal,
}

/// Parameters replaced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamsUpdatedEvent {
    /// Authority after the update
    pub authority: String,
}

/// Emergency mode toggled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyModeEvent {
    /// New value
    pub enabled: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT RECORD
// ═══════════════════════════════════════════════════════════════════════════════

/// Event stamped with the block it was emitted in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Block height
    pub block_height: u64,
    /// Block time
    pub timestamp: u64,
    /// Payload
    pub event: ModuleEvent,
}

impl EventRecord {
    /// Stamp `event` with `ctx`
    pub fn new(ctx: &BlockContext, event: ModuleEvent) -> Self {
        Self {
            block_height: ctx.height,
            timestamp: ctx.time,
            event,
        }
    }

    /// Event name
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }

    /// Payload attributes followed by the block height and RFC 3339 time
    pub fn attributes(&self) -> Vec<(String, String)> {
        let ctx = BlockContext::new(self.block_height, self.timestamp);
        let mut attrs = self.event.attributes();
        attrs.push(("block_height".to_string(), self.block_height.to_string()));
        attrs.push(("time".to_string(), ctx.time_rfc3339()));
        attrs
    }

    /// SHA-256 of the serialized record, hex encoded
    pub fn hash(&self) -> Result<String> {
        let bytes = bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Event log for collecting events during a block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<EventRecord>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event
    pub fn push(&mut self, record: EventRecord) {
        self.events.push(record);
    }

    /// Get all events
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&EventRecord> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get the number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Merge another event log into this one
    pub fn merge(&mut self, other: EventLog) {
        self.events.extend(other.events);
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
