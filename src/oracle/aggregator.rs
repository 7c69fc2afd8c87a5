//! Price aggregation.
//!
//! Computes the confidence-weighted ssUSD price over all active feeds whose
//! last observation is younger than their update frequency:
//!
//! ```text
//! price = Σ(price_i × weight_i) / Σ(weight_i)
//! ```
//!
//! When no feed is fresh, or the module is in emergency mode, the target
//! price is returned instead.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::config::ModuleParams;
use crate::error::{Error, Result};
use crate::oracle::price_feed::{FeedRegistration, PriceFeed};
use crate::storage::backend::StorageBackend;
use crate::storage::state::StateManager;
use crate::utils::math::*;
use crate::utils::validation::validate_price;

// ═══════════════════════════════════════════════════════════════════════════════
// WEIGHTED PRICE
// ═══════════════════════════════════════════════════════════════════════════════

/// Weighted average over the fresh feeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedPrice {
    /// Weighted price
    pub price: Decimal,
    /// Sum of contributing weights
    pub total_weight: Decimal,
    /// Contributing sources, in source order
    pub sources: Vec<String>,
}

/// Weighted average of the given feeds; `None` when the total weight is zero
pub fn weighted_price(feeds: &[PriceFeed]) -> Result<Option<WeightedPrice>> {
    let mut weighted_sum = Decimal::ZERO;
    let mut total_weight = Decimal::ZERO;
    let mut sources = Vec::with_capacity(feeds.len());

    for feed in feeds {
        weighted_sum = dec_add(weighted_sum, dec_mul(feed.price, feed.weight)?)?;
        total_weight = dec_add(total_weight, feed.weight)?;
        sources.push(feed.source.clone());
    }

    if total_weight.is_zero() {
        return Ok(None);
    }

    Ok(Some(WeightedPrice {
        price: dec_div(weighted_sum, total_weight)?,
        total_weight,
        sources,
    }))
}

/// Result of an accepted observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedUpdate {
    /// Feed after the update
    pub feed: PriceFeed,
    /// Weighted price the observation was checked against
    pub reference_price: Decimal,
    /// `|price - reference| / reference`
    pub deviation: Decimal,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE AGGREGATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Feed registry and weighted price over the module store
pub struct PriceAggregator<'a, B: StorageBackend> {
    state: &'a StateManager<B>,
    params: &'a ModuleParams,
}

impl<'a, B: StorageBackend> PriceAggregator<'a, B> {
    /// Create an aggregator over `state`
    pub fn new(state: &'a StateManager<B>, params: &'a ModuleParams) -> Self {
        Self { state, params }
    }

    /// Register a new feed.
    ///
    /// The feed starts at the target price and only contributes after its
    /// first accepted observation.
    pub fn register_feed(&self, registration: FeedRegistration) -> Result<PriceFeed> {
        if self.state.load_feed(&registration.source)?.is_some() {
            return Err(Error::FeedAlreadyExists(registration.source));
        }

        let feed = PriceFeed::new(registration, self.params.target_price);
        feed.validate()?;
        self.state.save_feed(&feed)?;

        tracing::info!(source = %feed.source, weight = %feed.weight, "Registered price feed");
        Ok(feed)
    }

    /// Apply an observation from `source`.
    ///
    /// The observation is rejected when it is older than the feed's last
    /// update, already stale at `now`, in the future, or deviates from the
    /// current weighted price by more than the feed's tolerance.
    pub fn update_feed(
        &self,
        source: &str,
        price: Decimal,
        observed_at: u64,
        now: u64,
    ) -> Result<FeedUpdate> {
        validate_price(source, price)?;

        let mut feed = self
            .state
            .load_feed(source)?
            .ok_or_else(|| Error::UnknownFeed(source.to_string()))?;

        let stale = |reason: String| Error::StaleOrDeviatingPrice {
            source_id: source.to_string(),
            reason,
        };

        if observed_at > now {
            return Err(stale(format!(
                "observation at {} is after block time {}",
                observed_at, now
            )));
        }
        if observed_at < feed.last_update {
            return Err(stale(format!(
                "observation at {} is older than last update {}",
                observed_at, feed.last_update
            )));
        }
        if now - observed_at >= feed.update_frequency_secs {
            return Err(stale(format!(
                "observation is {}s old, frequency is {}s",
                now - observed_at,
                feed.update_frequency_secs
            )));
        }

        let reference_price = self.current_price(now)?;
        let deviation = relative_deviation(price, reference_price)?;

        if deviation > feed.deviation_limit() {
            return Err(stale(format!(
                "price {} deviates {} from weighted price {}, limit {}",
                price,
                deviation,
                reference_price,
                feed.deviation_limit()
            )));
        }

        feed.apply_observation(price, observed_at);
        self.state.save_feed(&feed)?;

        tracing::debug!(
            source,
            %price,
            %reference_price,
            %deviation,
            "Accepted price observation"
        );

        Ok(FeedUpdate {
            feed,
            reference_price,
            deviation,
        })
    }

    /// Feeds that currently contribute to the weighted price
    pub fn active_feeds(&self, now: u64) -> Result<Vec<PriceFeed>> {
        Ok(self
            .state
            .load_all_feeds()?
            .into_iter()
            .filter(|f| f.is_fresh(now))
            .collect())
    }

    /// Weighted price over fresh feeds, ignoring emergency mode
    pub fn weighted(&self, now: u64) -> Result<Option<WeightedPrice>> {
        weighted_price(&self.active_feeds(now)?)
    }

    /// Current ssUSD price, falling back to target
    pub fn current_price(&self, now: u64) -> Result<Decimal> {
        if self.params.emergency_mode {
            return Ok(self.params.target_price);
        }

        Ok(self
            .weighted(now)?
            .map(|w| w.price)
            .unwrap_or(self.params.target_price))
    }

    /// Mark every active feed whose last observation has aged out as inactive.
    ///
    /// Returns the sources that were deactivated.
    pub fn deactivate_stale(&self, now: u64) -> Result<Vec<String>> {
        let mut deactivated = Vec::new();

        for mut feed in self.state.load_all_feeds()? {
            if feed.active && !feed.is_fresh(now) {
                feed.active = false;
                self.state.save_feed(&feed)?;
                tracing::warn!(
                    source = %feed.source,
                    age = feed.age(now),
                    "Deactivated stale price feed"
                );
                deactivated.push(feed.source);
            }
        }

        Ok(deactivated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::price_feed::default_feeds;
    use crate::storage::backend::InMemoryStore;
    use std::str::FromStr;

    const NOW: u64 = 1_700_000_000;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn setup() -> (StateManager<InMemoryStore>, ModuleParams) {
        let state = StateManager::new(InMemoryStore::new());
        let params = ModuleParams::default();
        for feed in default_feeds(params.target_price) {
            state.save_feed(&feed).unwrap();
        }
        (state, params)
    }

    #[test]
    fn test_no_fresh_feeds_returns_target() {
        let (state, params) = setup();
        let agg = PriceAggregator::new(&state, &params);
        assert_eq!(agg.current_price(NOW).unwrap(), Decimal::ONE);
        assert!(agg.weighted(NOW).unwrap().is_none());
    }

    #[test]
    fn test_weighted_scenario() {
        let (state, params) = setup();
        let agg = PriceAggregator::new(&state, &params);

        agg.update_feed("chainlink_usd", d("1.00"), NOW, NOW).unwrap();
        agg.update_feed("band_usd", d("1.02"), NOW, NOW).unwrap();
        agg.update_feed("internal_twap", d("0.99"), NOW, NOW).unwrap();

        // 0.4 * 1.00 + 0.3 * 1.02 + 0.3 * 0.99 = 1.003
        let weighted = agg.weighted(NOW).unwrap().unwrap();
        assert_eq!(weighted.price, d("1.003"));
        assert_eq!(weighted.sources.len(), 3);
    }

    #[test]
    fn test_unknown_feed() {
        let (state, params) = setup();
        let agg = PriceAggregator::new(&state, &params);
        assert_eq!(
            agg.update_feed("pyth", Decimal::ONE, NOW, NOW).unwrap_err(),
            Error::UnknownFeed("pyth".into())
        );
    }

    #[test]
    fn test_deviation_limit() {
        let (state, params) = setup();
        let agg = PriceAggregator::new(&state, &params);

        // Exactly at the 2% tolerance is accepted
        agg.update_feed("chainlink_usd", d("1.02"), NOW, NOW).unwrap();

        // 0.97 against 1.02 is ~4.9% away
        let err = agg.update_feed("band_usd", d("0.97"), NOW, NOW).unwrap_err();
        assert!(matches!(err, Error::StaleOrDeviatingPrice { .. }));
        // Rejected update left the feed untouched
        assert_eq!(state.load_feed("band_usd").unwrap().unwrap().last_update, 0);
    }

    #[test]
    fn test_stale_observations_rejected() {
        let (state, params) = setup();
        let agg = PriceAggregator::new(&state, &params);

        agg.update_feed("chainlink_usd", Decimal::ONE, NOW, NOW).unwrap();

        // Older than last update
        assert!(agg.update_feed("chainlink_usd", Decimal::ONE, NOW - 1, NOW).is_err());
        // Already stale at block time
        assert!(agg.update_feed("band_usd", Decimal::ONE, NOW - 300, NOW).is_err());
        // From the future
        assert!(agg.update_feed("band_usd", Decimal::ONE, NOW + 1, NOW).is_err());
    }

    #[test]
    fn test_freshness_window() {
        let (state, params) = setup();
        let agg = PriceAggregator::new(&state, &params);

        agg.update_feed("chainlink_usd", d("1.01"), NOW, NOW).unwrap();
        assert_eq!(agg.current_price(NOW + 299).unwrap(), d("1.01"));
        assert_eq!(agg.current_price(NOW + 300).unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_unreported_feeds_do_not_contribute() {
        let (state, params) = setup();
        let agg = PriceAggregator::new(&state, &params);

        // Block times inside the first frequency window
        assert!(agg.active_feeds(10).unwrap().is_empty());
        assert!(agg.weighted(10).unwrap().is_none());
        assert_eq!(agg.current_price(10).unwrap(), params.target_price);
    }

    #[test]
    fn test_deactivate_stale() {
        let (state, params) = setup();
        let agg = PriceAggregator::new(&state, &params);

        agg.update_feed("chainlink_usd", Decimal::ONE, NOW, NOW).unwrap();
        agg.update_feed("internal_twap", Decimal::ONE, NOW, NOW).unwrap();

        // internal_twap ages out after 60s; band_usd never reported
        let deactivated = agg.deactivate_stale(NOW + 60).unwrap();
        assert_eq!(deactivated, vec!["band_usd".to_string(), "internal_twap".to_string()]);
        assert_eq!(agg.active_feeds(NOW + 60).unwrap().len(), 1);

        // Next accepted update reactivates
        agg.update_feed("internal_twap", Decimal::ONE, NOW + 61, NOW + 61).unwrap();
        assert!(state.load_feed("internal_twap").unwrap().unwrap().active);
    }

    #[test]
    fn test_register_feed() {
        let (state, params) = setup();
        let agg = PriceAggregator::new(&state, &params);

        let feed = agg
            .register_feed(FeedRegistration::new("pyth_usd", d("0.2")))
            .unwrap();
        assert_eq!(feed.price, Decimal::ONE);

        assert_eq!(
            agg.register_feed(FeedRegistration::new("pyth_usd", d("0.2"))).unwrap_err(),
            Error::FeedAlreadyExists("pyth_usd".into())
        );
        assert!(agg
            .register_feed(FeedRegistration::new("heavy", d("1.5")))
            .is_err());
    }

    #[test]
    fn test_emergency_mode_pins_target() {
        let (state, mut params) = setup();
        {
            let agg = PriceAggregator::new(&state, &params);
            agg.update_feed("chainlink_usd", d("1.01"), NOW, NOW).unwrap();
        }
        params.emergency_mode = true;
        let agg = PriceAggregator::new(&state, &params);
        assert_eq!(agg.current_price(NOW).unwrap(), Decimal::ONE);
    }
}
