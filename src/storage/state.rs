//! Module state management with persistence.
//!
//! This module provides typed access to every record the ssUSD module keeps
//! in its key-value store:
//!
//! | Key                          | Value               |
//! |------------------------------|---------------------|
//! | `params/module`              | `ModuleParams`      |
//! | `feed/{source}`              | `PriceFeed`         |
//! | `reserve/{class_id}`         | `ReserveAssetClass` |
//! | `supply/{denom}`             | `Stablecoin`        |
//! | `controller/state`           | `ControllerState`   |
//! | `rebalance_history/{seq:020}`| `RebalanceEvent`    |

use sha2::{Digest, Sha256};

use crate::core::config::ModuleParams;
use crate::core::stablecoin::Stablecoin;
use crate::error::{Error, Result};
use crate::oracle::price_feed::PriceFeed;
use crate::peg::controller::{ControllerState, RebalanceEvent};
use crate::reserve::ledger::ReserveAssetClass;
use crate::storage::backend::{make_key, prefixes, StorageBackend, TypedStore};
use crate::utils::constants::HISTORY_SEQ_WIDTH;

// ═══════════════════════════════════════════════════════════════════════════════
// STATE MANAGER
// ═══════════════════════════════════════════════════════════════════════════════

/// High-level state manager for the module
pub struct StateManager<B: StorageBackend> {
    store: TypedStore<B>,
}

impl<B: StorageBackend> StateManager<B> {
    /// Create a new state manager
    pub fn new(backend: B) -> Self {
        Self {
            store: TypedStore::new(backend),
        }
    }

    /// Underlying backend
    pub fn backend(&self) -> &B {
        self.store.backend()
    }

    /// Unwrap into the underlying backend
    pub fn into_backend(self) -> B {
        self.store.into_backend()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PARAMETERS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Load module parameters
    pub fn load_params(&self) -> Result<ModuleParams> {
        let key = make_key(prefixes::PARAMS, b"module");
        self.store
            .get(&key)?
            .ok_or_else(|| Error::Internal("Module parameters not initialized".into()))
    }

    /// Save module parameters
    pub fn save_params(&self, params: &ModuleParams) -> Result<()> {
        let key = make_key(prefixes::PARAMS, b"module");
        self.store.set(&key, params)
    }

    /// Whether genesis has been applied
    pub fn is_initialized(&self) -> Result<bool> {
        self.store.exists(&make_key(prefixes::PARAMS, b"module"))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PRICE FEEDS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Load a feed by source
    pub fn load_feed(&self, source: &str) -> Result<Option<PriceFeed>> {
        self.store.get(&make_key(prefixes::FEED, source.as_bytes()))
    }

    /// Save a feed
    pub fn save_feed(&self, feed: &PriceFeed) -> Result<()> {
        self.store
            .set(&make_key(prefixes::FEED, feed.source.as_bytes()), feed)
    }

    /// Load all feeds, ordered by source
    pub fn load_all_feeds(&self) -> Result<Vec<PriceFeed>> {
        self.store.values_with_prefix(prefixes::FEED)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RESERVE CLASSES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Load a reserve class by id
    pub fn load_reserve_class(&self, class_id: &str) -> Result<Option<ReserveAssetClass>> {
        self.store
            .get(&make_key(prefixes::RESERVE, class_id.as_bytes()))
    }

    /// Save a reserve class
    pub fn save_reserve_class(&self, class: &ReserveAssetClass) -> Result<()> {
        self.store
            .set(&make_key(prefixes::RESERVE, class.class_id.as_bytes()), class)
    }

    /// Load all reserve classes in their fixed position order
    pub fn load_reserve_classes(&self) -> Result<Vec<ReserveAssetClass>> {
        let mut classes: Vec<ReserveAssetClass> =
            self.store.values_with_prefix(prefixes::RESERVE)?;
        classes.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.class_id.cmp(&b.class_id))
        });
        Ok(classes)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SUPPLY
    // ═══════════════════════════════════════════════════════════════════════════

    /// Load a stablecoin record
    pub fn load_stablecoin(&self, denom: &str) -> Result<Stablecoin> {
        self.store
            .get(&make_key(prefixes::SUPPLY, denom.as_bytes()))?
            .ok_or_else(|| Error::StablecoinNotFound(denom.to_string()))
    }

    /// Save a stablecoin record
    pub fn save_stablecoin(&self, coin: &Stablecoin) -> Result<()> {
        self.store
            .set(&make_key(prefixes::SUPPLY, coin.denom.as_bytes()), coin)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PEG CONTROLLER
    // ═══════════════════════════════════════════════════════════════════════════

    /// Load controller state, or a fresh state if none is stored
    pub fn load_controller_state(&self) -> Result<ControllerState> {
        Ok(self
            .store
            .get(&make_key(prefixes::CONTROLLER, b"state"))?
            .unwrap_or_default())
    }

    /// Save controller state
    pub fn save_controller_state(&self, state: &ControllerState) -> Result<()> {
        self.store
            .set(&make_key(prefixes::CONTROLLER, b"state"), state)
    }

    /// Append a rebalance event under its sequence number
    pub fn append_rebalance_event(&self, event: &RebalanceEvent) -> Result<()> {
        let key = history_key(event.seq);
        if self.store.exists(&key)? {
            return Err(Error::InvariantViolation(format!(
                "rebalance history entry {} already exists",
                event.seq
            )));
        }
        self.store.set(&key, event)
    }

    /// Rebalance history, oldest first, keeping only the last `limit` entries if given
    pub fn load_rebalance_history(&self, limit: Option<usize>) -> Result<Vec<RebalanceEvent>> {
        let keys = self.store.list_prefix(prefixes::REBALANCE_HISTORY)?;
        let skip = match limit {
            Some(n) => keys.len().saturating_sub(n),
            None => 0,
        };

        let mut events = Vec::with_capacity(keys.len() - skip);
        for key in keys.iter().skip(skip) {
            if let Some(event) = self.store.get(key)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // UTILITY METHODS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Flush all pending writes
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    /// SHA-256 over every key and value in key order, hex encoded.
    ///
    /// Two replicas that applied the same transactions produce the same hash.
    pub fn state_hash(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        for key in self.store.keys()? {
            let value = self.backend().get(&key)?.unwrap_or_default();
            hasher.update((key.len() as u64).to_be_bytes());
            hasher.update(&key);
            hasher.update((value.len() as u64).to_be_bytes());
            hasher.update(&value);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

fn history_key(seq: u64) -> Vec<u8> {
    let padded = format!("{:0width$}", seq, width = HISTORY_SEQ_WIDTH);
    make_key(prefixes::REBALANCE_HISTORY, padded.as_bytes())
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
