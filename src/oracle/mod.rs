//! Oracle module for price feeds.
//!
//! This module provides price feed functionality:
//! - A registry of weighted price sources
//! - Staleness and deviation checks on every observation
//! - The confidence-weighted ssUSD price
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ssusd::oracle::PriceAggregator;
//!
//! let aggregator = PriceAggregator::new(&state, &params);
//! aggregator.update_feed("chainlink_usd", price, observed_at, block_time)?;
//! let price = aggregator.current_price(block_time)?;
//! ```

pub mod aggregator;
pub mod price_feed;

pub use aggregator::*;
pub use price_feed::*;
