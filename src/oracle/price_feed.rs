//! Price feed records.
//!
//! This module provides the persisted per-source feed:
//! - Registration parameters and validation
//! - Freshness checks
//! - Applying a new observation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::math::bps_to_decimal;
use crate::utils::validation::*;

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE FEED
// ═══════════════════════════════════════════════════════════════════════════════

/// Latest observation and configuration of one price source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeed {
    /// Source identifier (e.g. `chainlink_usd`)
    pub source: String,
    /// Last accepted price in USD
    pub price: Decimal,
    /// Confidence weight in (0, 1]
    pub weight: Decimal,
    /// Unix time of the last accepted observation
    pub last_update: u64,
    /// Max deviation of an observation from the weighted price, in bps
    pub deviation_limit_bps: u64,
    /// Observations older than this are stale
    pub update_frequency_secs: u64,
    /// Inactive feeds are ignored until their next accepted update
    pub active: bool,
}

impl PriceFeed {
    /// Create a feed from its registration parameters.
    ///
    /// The feed starts at `initial_price` with no observation on record, so it
    /// does not contribute to the weighted price until the first update.
    pub fn new(registration: FeedRegistration, initial_price: Decimal) -> Self {
        Self {
            source: registration.source,
            price: initial_price,
            weight: registration.weight,
            last_update: 0,
            deviation_limit_bps: registration.deviation_limit_bps,
            update_frequency_secs: registration.update_frequency_secs,
            active: true,
        }
    }

    /// Tolerance as a decimal fraction
    pub fn deviation_limit(&self) -> Decimal {
        bps_to_decimal(self.deviation_limit_bps)
    }

    /// Seconds since the last accepted observation
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_update)
    }

    /// Whether an observation has ever been accepted
    pub fn has_reported(&self) -> bool {
        self.last_update > 0
    }

    /// Active, reported at least once, and updated within its frequency window
    pub fn is_fresh(&self, now: u64) -> bool {
        self.active && self.has_reported() && self.age(now) < self.update_frequency_secs
    }

    /// Record an accepted observation
    pub fn apply_observation(&mut self, price: Decimal, observed_at: u64) {
        self.price = price;
        self.last_update = observed_at;
        self.active = true;
    }

    /// Validate stored fields
    pub fn validate(&self) -> Result<()> {
        validate_identifier("source", &self.source)?;
        validate_price(&self.source, self.price)?;
        validate_weight("weight", self.weight)?;
        validate_bps("deviation_limit_bps", self.deviation_limit_bps)?;
        if self.update_frequency_secs == 0 {
            return Err(Error::InvalidParameter {
                name: "update_frequency_secs".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Parameters for registering a new feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRegistration {
    /// Source identifier
    pub source: String,
    /// Confidence weight in (0, 1]
    pub weight: Decimal,
    /// Max deviation in bps
    pub deviation_limit_bps: u64,
    /// Staleness window in seconds
    pub update_frequency_secs: u64,
}

impl FeedRegistration {
    /// Registration with the default tolerance and frequency
    pub fn new(source: impl Into<String>, weight: Decimal) -> Self {
        Self {
            source: source.into(),
            weight,
            deviation_limit_bps: DEFAULT_FEED_TOLERANCE_BPS,
            update_frequency_secs: DEFAULT_FEED_UPDATE_FREQUENCY_SECS,
        }
    }

    /// Override the tolerance
    pub fn with_deviation_limit_bps(mut self, bps: u64) -> Self {
        self.deviation_limit_bps = bps;
        self
    }

    /// Override the staleness window
    pub fn with_update_frequency(mut self, secs: u64) -> Self {
        self.update_frequency_secs = secs;
        self
    }
}

/// Feeds registered at genesis: Chainlink 40%, Band 30%, internal TWAP 30%
pub fn default_feeds(target_price: Decimal) -> Vec<PriceFeed> {
    vec![
        PriceFeed::new(
            FeedRegistration::new("chainlink_usd", Decimal::new(40, 2)),
            target_price,
        ),
        PriceFeed::new(
            FeedRegistration::new("band_usd", Decimal::new(30, 2)),
            target_price,
        ),
        PriceFeed::new(
            FeedRegistration::new("internal_twap", Decimal::new(30, 2))
                .with_deviation_limit_bps(300)
                .with_update_frequency(60),
            target_price,
        ),
    ]
}
