//! Peg controller.
//!
//! Runs on every accepted price update. When the weighted price drifts more
//! than the rebalance threshold away from target and the cooldown has
//! elapsed, the controller steps its PID law and records a stability signal
//! (mint, burn or no action) in the append-only rebalance history. The
//! signal is advisory: supply only changes through issuance and redemption.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::config::ModuleParams;
use crate::core::context::BlockContext;
use crate::error::Result;
use crate::peg::pid::{PidController, PidState};
use crate::storage::backend::StorageBackend;
use crate::storage::state::StateManager;
use crate::utils::math::{bps_to_decimal, dec_mul, decimal_to_amount_floor, signed_deviation};

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Peg state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PegStatus {
    /// Price within threshold of target
    #[default]
    Stable,
    /// Price outside threshold but the controller is cooling down
    Deviated,
    /// Controller produced a signal on the last update
    Rebalancing,
}

impl fmt::Display for PegStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stable => "stable",
            Self::Deviated => "deviated",
            Self::Rebalancing => "rebalancing",
        };
        f.write_str(s)
    }
}

/// Stability action signalled by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceAction {
    /// Expand supply (price above peg)
    Mint,
    /// Contract supply (price below peg)
    Burn,
    /// Output inside the dead band; adjust rates only
    #[serde(rename = "none")]
    NoAction,
}

impl RebalanceAction {
    /// Whether this action changes supply
    pub fn is_action(&self) -> bool {
        !matches!(self, Self::NoAction)
    }
}

impl fmt::Display for RebalanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Mint => "mint",
            Self::Burn => "burn",
            Self::NoAction => "none",
        };
        f.write_str(s)
    }
}

/// Audit record of one controller step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceEvent {
    /// Position in the rebalance history
    pub seq: u64,
    /// Block height
    pub block_height: u64,
    /// Block time
    pub timestamp: u64,
    /// Weighted price that triggered the step
    pub price_before: Decimal,
    /// Peg target
    pub price_target: Decimal,
    /// Signed relative deviation `(price - target) / target`
    pub deviation: Decimal,
    /// Controller output
    pub control_output: Decimal,
    /// Signalled action
    pub action: RebalanceAction,
    /// `⌊|u| × scale⌋`, zero for no action
    pub amount: u128,
    /// Human readable explanation
    pub reason: String,
}

/// Persisted controller state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    /// PID memory
    pub pid: PidState,
    /// Current peg status
    pub status: PegStatus,
    /// Time of the last PID step
    pub last_update: Option<u64>,
    /// Time of the last step that signalled mint or burn
    pub last_rebalance: Option<u64>,
    /// Sequence number of the next rebalance event
    pub next_seq: u64,
}

/// What a price update did to the peg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PegOutcome {
    /// Status before the update
    pub previous_status: PegStatus,
    /// Status after the update
    pub status: PegStatus,
    /// Signed relative deviation from target
    pub deviation: Decimal,
    /// Controller step recorded by this update, if any
    pub event: Option<RebalanceEvent>,
}

impl PegOutcome {
    /// Whether the status changed
    pub fn status_changed(&self) -> bool {
        self.previous_status != self.status
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROLLER
// ═══════════════════════════════════════════════════════════════════════════════

/// Peg controller bound to the module store
pub struct PegController<'a, B: StorageBackend> {
    state: &'a StateManager<B>,
    params: &'a ModuleParams,
}

impl<'a, B: StorageBackend> PegController<'a, B> {
    /// Create a controller over `state`
    pub fn new(state: &'a StateManager<B>, params: &'a ModuleParams) -> Self {
        Self { state, params }
    }

    /// Current controller state
    pub fn state(&self) -> Result<ControllerState> {
        self.state.load_controller_state()
    }

    /// Rebalance history, oldest first; `limit` keeps only the most recent entries
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<RebalanceEvent>> {
        self.state.load_rebalance_history(limit)
    }

    /// React to a new weighted price
    pub fn on_price_update(&self, price: Decimal, ctx: &BlockContext) -> Result<PegOutcome> {
        let mut controller = self.state()?;
        let previous_status = controller.status;
        let target = self.params.target_price;
        let deviation = signed_deviation(price, target)?;

        if self.params.emergency_mode {
            tracing::debug!(%price, "Emergency mode active, peg controller idle");
            return Ok(PegOutcome {
                previous_status,
                status: previous_status,
                deviation,
                event: None,
            });
        }

        let threshold = bps_to_decimal(self.params.rebalance_threshold_bps);

        if deviation.abs() <= threshold {
            if previous_status != PegStatus::Stable {
                controller.status = PegStatus::Stable;
                self.state.save_controller_state(&controller)?;
                tracing::info!(%price, from = %previous_status, "Peg restored");
            }
            return Ok(PegOutcome {
                previous_status,
                status: PegStatus::Stable,
                deviation,
                event: None,
            });
        }

        let cooling_down = controller.last_rebalance.map_or(false, |last| {
            ctx.time.saturating_sub(last) < self.params.rebalance_cooldown_secs
        });

        if cooling_down {
            tracing::warn!(
                %price,
                %deviation,
                last_rebalance = ?controller.last_rebalance,
                "Peg deviation detected during rebalance cooldown"
            );
            return Ok(PegOutcome {
                previous_status,
                status: PegStatus::Deviated,
                deviation,
                event: None,
            });
        }

        let event = self.rebalance(&mut controller, price, deviation, ctx)?;

        Ok(PegOutcome {
            previous_status,
            status: PegStatus::Rebalancing,
            deviation,
            event: Some(event),
        })
    }

    fn rebalance(
        &self,
        controller: &mut ControllerState,
        price: Decimal,
        deviation: Decimal,
        ctx: &BlockContext,
    ) -> Result<RebalanceEvent> {
        let pid = PidController::new(self.params.pid.clone());
        let dt = controller
            .last_update
            .map_or(1, |last| ctx.time.saturating_sub(last));

        let step = pid.step(&mut controller.pid, deviation, dt)?;
        let u = step.output;

        let scaled = dec_mul(u.abs(), Decimal::from(self.params.pid.rebalance_scale))?;
        let amount = decimal_to_amount_floor(scaled)?;

        let action = if pid.in_dead_band(u) || amount == 0 {
            RebalanceAction::NoAction
        } else if u > Decimal::ZERO {
            RebalanceAction::Mint
        } else {
            RebalanceAction::Burn
        };

        let (amount, reason) = match action {
            RebalanceAction::Mint => (
                amount,
                format!("price {} above target {}, expand supply", price, self.params.target_price),
            ),
            RebalanceAction::Burn => (
                amount,
                format!("price {} below target {}, contract supply", price, self.params.target_price),
            ),
            RebalanceAction::NoAction => (
                0,
                format!("control output {} inside dead band, adjust rate", u),
            ),
        };

        let event = RebalanceEvent {
            seq: controller.next_seq,
            block_height: ctx.height,
            timestamp: ctx.time,
            price_before: price,
            price_target: self.params.target_price,
            deviation,
            control_output: u,
            action,
            amount,
            reason,
        };

        controller.status = PegStatus::Rebalancing;
        controller.last_update = Some(ctx.time);
        controller.next_seq += 1;
        if action.is_action() {
            controller.last_rebalance = Some(ctx.time);
        }

        self.state.append_rebalance_event(&event)?;
        self.state.save_controller_state(controller)?;

        tracing::info!(
            seq = event.seq,
            %price,
            %deviation,
            output = %u,
            action = %action,
            amount,
            "Peg controller step"
        );

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::InMemoryStore;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn setup() -> (StateManager<InMemoryStore>, ModuleParams) {
        (StateManager::new(InMemoryStore::new()), ModuleParams::default())
    }

    #[test]
    fn test_within_threshold_is_stable() {
        let (state, params) = setup();
        let controller = PegController::new(&state, &params);

        let outcome = controller
            .on_price_update(d("1.003"), &BlockContext::new(1, 1_000))
            .unwrap();
        assert_eq!(outcome.status, PegStatus::Stable);
        assert!(outcome.event.is_none());
        assert!(controller.history(None).unwrap().is_empty());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let (state, params) = setup();
        let controller = PegController::new(&state, &params);

        // Exactly 0.5% does not trigger
        let outcome = controller
            .on_price_update(d("1.005"), &BlockContext::new(1, 1_000))
            .unwrap();
        assert_eq!(outcome.status, PegStatus::Stable);
    }

    #[test]
    fn test_price_above_peg_signals_mint() {
        let (state, params) = setup();
        let controller = PegController::new(&state, &params);

        let outcome = controller
            .on_price_update(d("1.01"), &BlockContext::new(1, 1_000))
            .unwrap();
        assert_eq!(outcome.status, PegStatus::Rebalancing);

        let event = outcome.event.unwrap();
        assert_eq!(event.action, RebalanceAction::Mint);
        // u = 0.1*0.01 + 0.05*0.01 + 0.02*0.01 = 0.0017
        assert_eq!(event.control_output, d("0.0017"));
        assert_eq!(event.amount, 1_700);
        assert_eq!(event.seq, 0);

        let stored = controller.state().unwrap();
        assert_eq!(stored.last_rebalance, Some(1_000));
        assert_eq!(stored.next_seq, 1);
        assert_eq!(stored.status, PegStatus::Rebalancing);
    }

    #[test]
    fn test_price_below_peg_signals_burn() {
        let (state, params) = setup();
        let controller = PegController::new(&state, &params);

        let event = controller
            .on_price_update(d("0.98"), &BlockContext::new(1, 1_000))
            .unwrap()
            .event
            .unwrap();
        assert_eq!(event.action, RebalanceAction::Burn);
        assert!(event.amount > 0);
    }

    #[test]
    fn test_cooldown_blocks_second_action() {
        let (state, params) = setup();
        let controller = PegController::new(&state, &params);

        controller
            .on_price_update(d("1.01"), &BlockContext::new(1, 1_000))
            .unwrap();

        let blocked = controller
            .on_price_update(d("1.02"), &BlockContext::new(2, 1_000 + 3_599))
            .unwrap();
        assert_eq!(blocked.status, PegStatus::Deviated);
        assert!(blocked.event.is_none());
        assert_eq!(controller.history(None).unwrap().len(), 1);

        let allowed = controller
            .on_price_update(d("1.02"), &BlockContext::new(3, 1_000 + 3_600))
            .unwrap();
        assert_eq!(allowed.status, PegStatus::Rebalancing);
        assert_eq!(controller.history(None).unwrap().len(), 2);
    }

    #[test]
    fn test_dead_band_records_no_action_without_cooldown() {
        let (state, mut params) = setup();
        params.pid.output_dead_band = d("1");
        let controller = PegController::new(&state, &params);

        let event = controller
            .on_price_update(d("1.01"), &BlockContext::new(1, 1_000))
            .unwrap()
            .event
            .unwrap();
        assert_eq!(event.action, RebalanceAction::NoAction);
        assert_eq!(event.amount, 0);
        assert_eq!(controller.state().unwrap().last_rebalance, None);

        // No cooldown started, so the next deviation steps again
        let next = controller
            .on_price_update(d("1.01"), &BlockContext::new(2, 1_010))
            .unwrap();
        assert!(next.event.is_some());
    }

    #[test]
    fn test_emergency_mode_is_idle() {
        let (state, mut params) = setup();
        params.emergency_mode = true;
        let controller = PegController::new(&state, &params);

        let outcome = controller
            .on_price_update(d("0.90"), &BlockContext::new(1, 1_000))
            .unwrap();
        assert!(outcome.event.is_none());
        assert_eq!(outcome.status, PegStatus::Stable);
    }

    #[test]
    fn test_return_to_stable() {
        let (state, params) = setup();
        let controller = PegController::new(&state, &params);

        controller
            .on_price_update(d("1.01"), &BlockContext::new(1, 1_000))
            .unwrap();
        let outcome = controller
            .on_price_update(d("1.0"), &BlockContext::new(2, 1_100))
            .unwrap();
        assert!(outcome.status_changed());
        assert_eq!(controller.state().unwrap().status, PegStatus::Stable);
    }

    #[test]
    fn test_history_limit() {
        let (state, params) = setup();
        let controller = PegController::new(&state, &params);

        for i in 0..3u64 {
            controller
                .on_price_update(d("1.01"), &BlockContext::new(i + 1, 1_000 + i * 3_600))
                .unwrap();
        }

        let recent = controller.history(Some(2)).unwrap();
        assert_eq!(recent.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);
    }
}
