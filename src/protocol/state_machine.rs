//! Module State Machine - Core orchestration engine.
//!
//! The state machine is the single entry point the host ledger talks to. It
//! applies one message at a time in host order and guarantees that each
//! message is atomic: every store write goes through a [`CacheStore`] and
//! every balance change through a [`CacheBank`]. Both are committed only when
//! the whole message succeeded.

use crate::bank::{BankKeeper, CacheBank};
use crate::core::config::{AllocationPolicy, ModuleParams};
use crate::core::context::BlockContext;
use crate::core::genesis::GenesisState;
use crate::core::stablecoin::Coin;
use crate::error::{Error, Result};
use crate::issuance::engine::IssuanceEngine;
use crate::oracle::aggregator::PriceAggregator;
use crate::peg::controller::{ControllerState, PegController};
use crate::protocol::events::*;
use crate::protocol::operations::*;
use crate::redemption::engine::RedemptionEngine;
use crate::reserve::ledger::ReserveLedger;
use crate::storage::backend::{CacheStore, StorageBackend};
use crate::storage::state::StateManager;
use crate::utils::constants::SSUSD_DENOM;
use crate::utils::math::{amount_to_decimal, signed_deviation};

// ═══════════════════════════════════════════════════════════════════════════════
// STATE MACHINE
// ═══════════════════════════════════════════════════════════════════════════════

/// ssUSD module state machine
pub struct SsusdModule<B: StorageBackend, K: BankKeeper> {
    /// State manager for persistence
    state: StateManager<B>,
    /// Ledger balance service
    bank: K,
    /// Block being applied
    ctx: BlockContext,
    /// Events of the current block
    event_log: EventLog,
}

impl<B: StorageBackend, K: BankKeeper> SsusdModule<B, K> {
    /// Create a module over the given store and bank
    pub fn new(backend: B, bank: K) -> Self {
        Self {
            state: StateManager::new(backend),
            bank,
            ctx: BlockContext::default(),
            event_log: EventLog::new(),
        }
    }

    /// Write the genesis state into an empty store
    pub fn init_genesis(&mut self, genesis: &GenesisState) -> Result<()> {
        if self.state.is_initialized()? {
            return Err(Error::Internal("module store is already initialized".into()));
        }
        genesis.validate()?;

        self.state.save_params(&genesis.params)?;
        for feed in &genesis.feeds {
            self.state.save_feed(feed)?;
        }
        for class in &genesis.reserve_classes {
            self.state.save_reserve_class(class)?;
        }
        self.state.save_stablecoin(&genesis.stablecoin)?;
        self.state.save_controller_state(&ControllerState::default())?;

        for balance in &genesis.balances {
            self.bank.mint(&balance.coins)?;
            self.bank.send_from_module(&balance.account, &balance.coins)?;
        }

        self.state.flush()?;

        tracing::info!(
            feeds = genesis.feeds.len(),
            reserve_classes = genesis.reserve_classes.len(),
            balances = genesis.balances.len(),
            "Initialized ssUSD genesis"
        );
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BLOCK PROCESSING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Begin a new block
    pub fn begin_block(&mut self, height: u64, time: u64) -> Result<()> {
        if time < self.ctx.time || height < self.ctx.height {
            return Err(Error::InvalidParameter {
                name: "block".into(),
                reason: format!(
                    "block {}@{} precedes {}@{}",
                    height, time, self.ctx.height, self.ctx.time
                ),
            });
        }
        self.ctx = BlockContext::new(height, time);
        self.event_log.clear();
        Ok(())
    }

    /// End the current block: retire stale feeds, flush, hand back the events
    pub fn end_block(&mut self) -> Result<EventLog> {
        let params = self.state.load_params()?;
        let aggregator = PriceAggregator::new(&self.state, &params);

        for source in aggregator.deactivate_stale(self.ctx.time)? {
            let last_update = self
                .state
                .load_feed(&source)?
                .map(|f| f.last_update)
                .unwrap_or_default();
            self.event_log.push(EventRecord::new(
                &self.ctx,
                ModuleEvent::FeedDeactivated(FeedDeactivatedEvent {
                    source,
                    last_update,
                }),
            ));
        }

        self.state.flush()?;
        Ok(std::mem::take(&mut self.event_log))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MESSAGE EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Execute one message atomically
    pub fn execute(&mut self, msg: Msg) -> Result<MsgResponse> {
        let ctx = self.ctx;
        let msg_type = msg.msg_type();
        let touches_supply = msg.touches_supply();

        let tx_state = StateManager::new(CacheStore::new(self.state.backend()));
        let mut tx_bank = CacheBank::new(&self.bank);
        let mut events = Vec::new();

        let result = (|| -> Result<MsgResponse> {
            let backed_before = touches_supply && is_backed(&tx_state)?;
            let response = dispatch(&tx_state, &mut tx_bank, &ctx, msg, &mut events)?;
            if backed_before && !is_backed(&tx_state)? {
                return Err(Error::InvariantViolation(
                    "reserve value fell below outstanding supply".into(),
                ));
            }
            Ok(response)
        })();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(msg_type, code = e.code(), error = %e, "Message rejected");
                return Err(e);
            }
        };

        tx_bank.into_journal().apply(&mut self.bank)?;
        tx_state.into_backend().commit()?;

        for event in events {
            self.event_log.push(EventRecord::new(&ctx, event));
        }

        tracing::debug!(msg_type, height = ctx.height, "Message committed");
        Ok(response)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Answer a read-only query against committed state
    pub fn query(&self, query: &Query) -> Result<QueryResponse> {
        let params = self.state.load_params()?;

        Ok(match query {
            Query::Price => QueryResponse::Price(self.price_info(&params)?),
            Query::ReserveComposition => {
                let supply = self.state.load_stablecoin(SSUSD_DENOM)?.total_supply;
                let ledger = ReserveLedger::new(&self.state, params.allocation_policy);
                QueryResponse::ReserveComposition(ledger.composition(supply)?)
            }
            Query::Stablecoin => QueryResponse::Stablecoin(self.state.load_stablecoin(SSUSD_DENOM)?),
            Query::Feeds => QueryResponse::Feeds {
                feeds: self.state.load_all_feeds()?,
            },
            Query::ControllerState => {
                QueryResponse::ControllerState(self.state.load_controller_state()?)
            }
            Query::RebalanceHistory { limit } => QueryResponse::RebalanceHistory {
                events: self.state.load_rebalance_history(*limit)?,
            },
            Query::Params => QueryResponse::Params(params),
            Query::Balance { account, denom } => {
                QueryResponse::Balance(Coin::new(denom.clone(), self.bank.balance(account, denom)))
            }
        })
    }

    fn price_info(&self, params: &ModuleParams) -> Result<PriceInfo> {
        let aggregator = PriceAggregator::new(&self.state, params);
        let price = aggregator.current_price(self.ctx.time)?;
        let source_count = if params.emergency_mode {
            0
        } else {
            aggregator
                .weighted(self.ctx.time)?
                .map_or(0, |w| w.sources.len())
        };

        Ok(PriceInfo {
            price,
            target: params.target_price,
            deviation: signed_deviation(price, params.target_price)?,
            source_count,
            status: self.state.load_controller_state()?.status,
            emergency_mode: params.emergency_mode,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Committed module state
    pub fn state(&self) -> &StateManager<B> {
        &self.state
    }

    /// Ledger balance service
    pub fn bank(&self) -> &K {
        &self.bank
    }

    /// Mutable ledger balance service, for host-side transfers outside the module
    pub fn bank_mut(&mut self) -> &mut K {
        &mut self.bank
    }

    /// Block currently being applied
    pub fn block_context(&self) -> BlockContext {
        self.ctx
    }

    /// Hash of the committed store
    pub fn state_hash(&self) -> Result<String> {
        self.state.state_hash()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISPATCH
// ═══════════════════════════════════════════════════════════════════════════════

fn is_backed<S: StorageBackend>(state: &StateManager<S>) -> Result<bool> {
    let supply = state.load_stablecoin(SSUSD_DENOM)?.total_supply;
    let reserve = ReserveLedger::new(state, AllocationPolicy::default()).total_value()?;
    Ok(reserve >= amount_to_decimal(supply)?)
}

fn dispatch<S: StorageBackend, K: BankKeeper + ?Sized>(
    state: &StateManager<S>,
    bank: &mut K,
    ctx: &BlockContext,
    msg: Msg,
    events: &mut Vec<ModuleEvent>,
) -> Result<MsgResponse> {
    let mut params = state.load_params()?;

    match msg {
        Msg::UpdatePrice(m) => {
            if !params.is_reporter_allowed(&m.reporter) {
                return Err(Error::Unauthorized(format!(
                    "{} may not report prices",
                    m.reporter
                )));
            }

            let aggregator = PriceAggregator::new(state, &params);
            let observed_at = m.observed_at.unwrap_or(ctx.time);
            let update = aggregator.update_feed(&m.source, m.price, observed_at, ctx.time)?;
            let weighted_price = aggregator.current_price(ctx.time)?;

            let peg = PegController::new(state, &params).on_price_update(weighted_price, ctx)?;

            events.push(ModuleEvent::PriceUpdated(PriceUpdatedEvent {
                source: m.source,
                price: m.price,
                weighted_price,
                deviation: peg.deviation,
            }));
            // Cooldown-blocked updates report Deviated without persisting it
            let stored = state.load_controller_state()?.status;
            if stored != peg.previous_status {
                events.push(ModuleEvent::PegStatusChanged(PegStatusChangedEvent {
                    from: peg.previous_status,
                    to: stored,
                    price: weighted_price,
                    deviation: peg.deviation,
                }));
            }
            if let Some(event) = &peg.event {
                events.push(ModuleEvent::Rebalance(event.clone()));
            }

            Ok(MsgResponse::PriceUpdated(PriceUpdateResult {
                feed: update.feed,
                weighted_price,
                peg,
            }))
        }

        Msg::Issue(m) => {
            let receipt = IssuanceEngine::new(state, &params).issue(
                bank,
                &m.requester,
                m.amount,
                &m.reserve_payment,
            )?;
            events.push(ModuleEvent::Issued(receipt.clone()));
            Ok(MsgResponse::Issued(receipt))
        }

        Msg::Redeem(m) => {
            let receipt = RedemptionEngine::new(state, &params).redeem(
                bank,
                &m.requester,
                m.amount,
                m.preferred(),
            )?;
            events.push(ModuleEvent::Redeemed(receipt.clone()));
            Ok(MsgResponse::Redeemed(receipt))
        }

        Msg::RegisterFeed(m) => {
            params.ensure_authority(&m.authority)?;
            let feed = PriceAggregator::new(state, &params).register_feed(m.feed)?;
            events.push(ModuleEvent::FeedRegistered(FeedRegisteredEvent {
                source: feed.source.clone(),
                weight: feed.weight,
                deviation_limit_bps: feed.deviation_limit_bps,
                update_frequency_secs: feed.update_frequency_secs,
            }));
            Ok(MsgResponse::FeedRegistered(feed))
        }

        Msg::SetAssetPrice(m) => {
            params.ensure_authority(&m.authority)?;
            let class = ReserveLedger::new(state, params.allocation_policy)
                .set_asset_price(&m.denom, m.price)?;
            tracing::info!(denom = %m.denom, price = %m.price, "Reserve asset repriced");
            events.push(ModuleEvent::AssetPriceSet(AssetPriceSetEvent {
                denom: m.denom,
                price: m.price,
            }));
            Ok(MsgResponse::AssetPriceSet(class))
        }

        Msg::UpdateParams(m) => {
            params.ensure_authority(&m.authority)?;
            m.params.validate()?;
            state.save_params(&m.params)?;
            tracing::info!(authority = %m.params.authority, "Module parameters updated");
            events.push(ModuleEvent::ParamsUpdated(ParamsUpdatedEvent {
                authority: m.params.authority.clone(),
            }));
            Ok(MsgResponse::ParamsUpdated(m.params))
        }

        Msg::SetEmergencyMode(m) => {
            params.ensure_authority(&m.authority)?;
            params.emergency_mode = m.enabled;
            state.save_params(&params)?;
            tracing::warn!(enabled = m.enabled, "Emergency mode set");
            events.push(ModuleEvent::EmergencyModeSet(EmergencyModeEvent {
                enabled: m.enabled,
            }));
            Ok(MsgResponse::EmergencyModeSet { enabled: m.enabled })
        }
    }
}
