//! Redemption engine.
//!
//! Burns ssUSD and pays out reserve assets at 1:1 USD value. The payout is
//! taken entirely from a preferred asset class when that class alone covers
//! the redemption, otherwise proportionally across all classes:
//!
//! ```text
//! share_i = redeem_value × (v_i / V)
//! units_i = ⌊share_i / price_i⌋
//! ```
//!
//! Classes are visited in their fixed position order. Unit rounding leaves a
//! remainder below one unit per class; a second pass tops the payout up from
//! the first classes that can still cover whole units.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bank::BankKeeper;
use crate::core::config::ModuleParams;
use crate::core::stablecoin::{format_coins, Coin};
use crate::error::{Error, Result};
use crate::reserve::ledger::{ReserveAssetClass, ReserveLedger};
use crate::storage::backend::StorageBackend;
use crate::storage::state::StateManager;
use crate::utils::constants::SSUSD_DENOM;
use crate::utils::math::*;
use crate::utils::validation::{validate_min_amount, validate_user_account};

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Reserve assets paid out from one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// Class identifier
    pub class_id: String,
    /// Asset denom
    pub denom: String,
    /// Units paid
    pub amount: u128,
    /// USD value of the units paid
    pub value: Decimal,
}

impl Payout {
    /// Payout as a coin
    pub fn coin(&self) -> Coin {
        Coin::new(self.denom.clone(), self.amount)
    }
}

/// Result of a successful redemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemReceipt {
    /// Account that redeemed
    pub requester: String,
    /// ssUSD taken from the requester
    pub amount: u128,
    /// Part of `amount` paid to the fee collector
    pub fee: u128,
    /// ssUSD burned and paid out in reserves
    pub redeem_value: u128,
    /// Reserve assets paid, in class order
    pub payouts: Vec<Payout>,
    /// USD value of all payouts
    pub payout_value: Decimal,
    /// Total reserve value after the redemption
    pub total_reserve_value: Decimal,
    /// ssUSD supply after the redemption
    pub total_supply: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Burn ssUSD for reserve assets
pub struct RedemptionEngine<'a, B: StorageBackend> {
    state: &'a StateManager<B>,
    params: &'a ModuleParams,
}

impl<'a, B: StorageBackend> RedemptionEngine<'a, B> {
    /// Create an engine over `state`
    pub fn new(state: &'a StateManager<B>, params: &'a ModuleParams) -> Self {
        Self { state, params }
    }

    fn ledger(&self) -> ReserveLedger<'a, B> {
        ReserveLedger::new(self.state, self.params.allocation_policy)
    }

    /// Compute the payout for `redeem_value` without touching any state.
    ///
    /// An unknown preferred asset, or one whose class cannot cover the whole
    /// redemption, falls back to the proportional payout. A redemption too
    /// small to buy a single whole unit of any held class is rejected.
    pub fn plan(&self, redeem_value: u128, preferred: Option<&str>) -> Result<Vec<Payout>> {
        let classes = self.ledger().classes()?;
        let required = amount_to_decimal(redeem_value)?;

        let mut total = Decimal::ZERO;
        for class in &classes {
            total = dec_add(total, class.value()?)?;
        }

        if total.is_zero() || total < required {
            return Err(Error::InsufficientCollateral {
                required,
                available: total,
            });
        }

        if let Some(asset) = preferred {
            match classes.iter().find(|c| c.matches(asset)) {
                Some(class) if class.value()? >= required => {
                    let units = decimal_to_amount_floor(dec_div(required, class.price)?)?;
                    if let Some(payout) = payout_for(class, units.min(class.units))? {
                        return Ok(vec![payout]);
                    }
                    tracing::debug!(
                        class = %class.class_id,
                        "Preferred reserve class unit price exceeds redemption, paying proportionally"
                    );
                }
                Some(class) => {
                    tracing::debug!(
                        class = %class.class_id,
                        "Preferred reserve class cannot cover redemption, paying proportionally"
                    );
                }
                None => {
                    tracing::debug!(asset, "Unknown preferred asset, paying proportionally");
                }
            }
        }

        let payouts = proportional(&classes, required, total)?;
        if payouts.is_empty() {
            // Every class with holdings prices a single unit above the redemption
            let cheapest = classes
                .iter()
                .filter(|c| c.units > 0)
                .map(|c| c.price)
                .min()
                .unwrap_or(Decimal::ONE);
            return Err(Error::AmountBelowMinimum {
                amount: redeem_value,
                minimum: decimal_to_amount_floor(cheapest.ceil())?,
            });
        }
        Ok(payouts)
    }

    /// Burn `amount` ssUSD from `requester` and pay out reserve assets
    pub fn redeem<K: BankKeeper + ?Sized>(
        &self,
        bank: &mut K,
        requester: &str,
        amount: u128,
        preferred: Option<&str>,
    ) -> Result<RedeemReceipt> {
        validate_user_account(requester, &self.params.fee_collector)?;
        let mut stablecoin = self.state.load_stablecoin(SSUSD_DENOM)?;
        stablecoin.ensure_active()?;
        if self.params.redeem_paused {
            return Err(Error::RedeemPaused);
        }
        validate_min_amount(amount, self.params.min_redeem_amount)?;

        let available = bank.balance(requester, SSUSD_DENOM);
        if available < amount {
            return Err(Error::InsufficientFunds {
                denom: SSUSD_DENOM.to_string(),
                required: amount,
                available,
            });
        }

        let fee = fee_amount(amount, self.params.redeem_fee_bps)?;
        let redeem_value = safe_sub(amount, fee)?;
        if redeem_value == 0 {
            return Err(Error::ZeroAmount);
        }

        let payouts = self.plan(redeem_value, preferred)?;
        let coins: Vec<Coin> = payouts.iter().map(Payout::coin).collect();
        let mut payout_value = Decimal::ZERO;
        for payout in &payouts {
            payout_value = dec_add(payout_value, payout.value)?;
        }

        bank.send_to_module(requester, &[Coin::ssusd(amount)])?;
        bank.burn(&[Coin::ssusd(redeem_value)])?;
        if fee > 0 {
            bank.send_from_module(&self.params.fee_collector, &[Coin::ssusd(fee)])?;
        }

        let total_reserve_value = self.ledger().withdraw(&coins)?;
        bank.send_from_module(requester, &coins)?;

        stablecoin.decrease_supply(redeem_value)?;
        self.state.save_stablecoin(&stablecoin)?;

        tracing::info!(
            requester,
            amount,
            fee,
            payout = %format_coins(&coins),
            %payout_value,
            total_supply = stablecoin.total_supply,
            "Redeemed ssUSD"
        );

        Ok(RedeemReceipt {
            requester: requester.to_string(),
            amount,
            fee,
            redeem_value,
            payouts,
            payout_value,
            total_reserve_value,
            total_supply: stablecoin.total_supply,
        })
    }
}

fn payout_for(class: &ReserveAssetClass, units: u128) -> Result<Option<Payout>> {
    if units == 0 {
        return Ok(None);
    }
    Ok(Some(Payout {
        class_id: class.class_id.clone(),
        denom: class.denom.clone(),
        amount: units,
        value: dec_mul(amount_to_decimal(units)?, class.price)?,
    }))
}

fn proportional(
    classes: &[ReserveAssetClass],
    required: Decimal,
    total: Decimal,
) -> Result<Vec<Payout>> {
    let mut units = vec![0u128; classes.len()];
    let mut remaining = required;

    for (i, class) in classes.iter().enumerate() {
        if remaining <= Decimal::ZERO {
            break;
        }
        let value = class.value()?;
        if value.is_zero() {
            continue;
        }
        // Ratio first keeps the intermediate product small
        let share = dec_mul(required, dec_div(value, total)?)?.min(remaining);
        let take = decimal_to_amount_floor(dec_div(share, class.price)?)?.min(class.units);
        units[i] = take;
        remaining = dec_sub(remaining, dec_mul(amount_to_decimal(take)?, class.price)?)?;
    }

    for (i, class) in classes.iter().enumerate() {
        if remaining <= Decimal::ZERO {
            break;
        }
        let left = class.units - units[i];
        let extra = decimal_to_amount_floor(dec_div(remaining, class.price)?)?.min(left);
        if extra == 0 {
            continue;
        }
        units[i] += extra;
        remaining = dec_sub(remaining, dec_mul(amount_to_decimal(extra)?, class.price)?)?;
    }

    let mut payouts = Vec::new();
    for (class, take) in classes.iter().zip(units) {
        if let Some(payout) = payout_for(class, take)? {
            payouts.push(payout);
        }
    }
    Ok(payouts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::InMemoryBank;
    use crate::core::stablecoin::Stablecoin;
    use crate::reserve::ledger::default_reserve_classes;
    use crate::storage::backend::InMemoryStore;
    use crate::utils::constants::MODULE_ACCOUNT;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    /// Reserve of 100 cash, 700 T-bills, 150 MMF, 50 repo backing 1000 ssUSD held by alice
    fn setup(params: &ModuleParams) -> (StateManager<InMemoryStore>, InMemoryBank) {
        let state = StateManager::new(InMemoryStore::new());
        state.save_params(params).unwrap();

        let holdings = [100u128, 700, 150, 50];
        let mut bank = InMemoryBank::new();
        for (mut class, units) in default_reserve_classes().into_iter().zip(holdings) {
            class.units = units;
            bank.fund(MODULE_ACCOUNT, &[Coin::new(class.denom.clone(), units)]).unwrap();
            state.save_reserve_class(&class).unwrap();
        }
        bank.fund("alice", &[Coin::ssusd(1000)]).unwrap();
        state
            .save_stablecoin(&Stablecoin {
                total_supply: 1000,
                ..Stablecoin::default()
            })
            .unwrap();
        (state, bank)
    }

    fn amounts(payouts: &[Payout]) -> Vec<(String, u128)> {
        payouts.iter().map(|p| (p.denom.clone(), p.amount)).collect()
    }

    #[test]
    fn test_proportional_scenario() {
        let params = ModuleParams::default();
        let (state, mut bank) = setup(&params);
        let engine = RedemptionEngine::new(&state, &params);

        let receipt = engine.redeem(&mut bank, "alice", 1000, None).unwrap();

        assert_eq!(
            amounts(&receipt.payouts),
            vec![
                ("us_cash_token".to_string(), 100),
                ("treasury_bill_token".to_string(), 700),
                ("mmf_token".to_string(), 150),
                ("repo_token".to_string(), 50),
            ]
        );
        assert_eq!(receipt.payout_value, Decimal::from(1000));
        assert_eq!(receipt.total_supply, 0);
        assert_eq!(receipt.total_reserve_value, Decimal::ZERO);
        assert_eq!(bank.balance("alice", "ssusd"), 0);
        assert_eq!(bank.balance("alice", "treasury_bill_token"), 700);
        assert_eq!(bank.supply_of("ssusd"), 0);
    }

    #[test]
    fn test_preferred_asset() {
        let params = ModuleParams::default();
        let (state, mut bank) = setup(&params);
        let engine = RedemptionEngine::new(&state, &params);

        let receipt = engine
            .redeem(&mut bank, "alice", 500, Some("treasury_bill_token"))
            .unwrap();
        assert_eq!(
            amounts(&receipt.payouts),
            vec![("treasury_bill_token".to_string(), 500)]
        );

        // By class id as well
        let plan = engine.plan(100, Some("us_cash")).unwrap();
        assert_eq!(amounts(&plan), vec![("us_cash_token".to_string(), 100)]);
    }

    #[test]
    fn test_preferred_fallbacks() {
        let params = ModuleParams::default();
        let (state, _) = setup(&params);
        let engine = RedemptionEngine::new(&state, &params);

        // Repo class holds only 50
        let plan = engine.plan(100, Some("repo_token")).unwrap();
        assert_eq!(plan.len(), 4);

        let plan = engine.plan(100, Some("gold")).unwrap();
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn test_rounding_remainder_swept() {
        let params = ModuleParams::default();
        let (state, _) = setup(&params);
        let engine = RedemptionEngine::new(&state, &params);

        // Shares 0.7 / 4.9 / 1.05 / 0.35 floor to 0 / 4 / 1 / 0
        let plan = engine.plan(7, None).unwrap();
        let total: u128 = plan.iter().map(|p| p.amount).sum();
        assert_eq!(total, 7);
    }

    #[test]
    fn test_non_unit_prices() {
        let params = ModuleParams::default();
        let (state, _) = setup(&params);
        ReserveLedger::new(&state, params.allocation_policy)
            .set_asset_price("mmf_token", d("1.5"))
            .unwrap();
        let engine = RedemptionEngine::new(&state, &params);

        let plan = engine.plan(1000, None).unwrap();
        let value: Decimal = plan.iter().map(|p| p.value).sum();
        assert!(value <= Decimal::from(1000));
        assert!(Decimal::from(1000) - value < d("1.5"));
    }

    #[test]
    fn test_module_accounts_cannot_redeem() {
        let params = ModuleParams::default();
        let (state, mut bank) = setup(&params);
        bank.fund(MODULE_ACCOUNT, &[Coin::ssusd(100)]).unwrap();
        let engine = RedemptionEngine::new(&state, &params);

        let err = engine.redeem(&mut bank, MODULE_ACCOUNT, 100, None).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
        assert_eq!(bank.balance(MODULE_ACCOUNT, "treasury_bill_token"), 700);
    }

    #[test]
    fn test_redemption_below_one_unit_rejected() {
        let params = ModuleParams::default();
        let (state, mut bank) = setup(&params);
        let ledger = ReserveLedger::new(&state, params.allocation_policy);
        for class in default_reserve_classes() {
            ledger.set_asset_price(&class.denom, d("1.5")).unwrap();
        }
        let engine = RedemptionEngine::new(&state, &params);

        assert_eq!(
            engine.plan(1, None).unwrap_err(),
            Error::AmountBelowMinimum {
                amount: 1,
                minimum: 2
            }
        );
        assert!(engine.plan(1, Some("us_cash_token")).is_err());

        let err = engine.redeem(&mut bank, "alice", 1, None).unwrap_err();
        assert!(matches!(err, Error::AmountBelowMinimum { .. }));
        assert_eq!(bank.balance("alice", "ssusd"), 1000);
        assert_eq!(bank.supply_of("ssusd"), 1000);
    }

    #[test]
    fn test_insufficient_funds() {
        let params = ModuleParams::default();
        let (state, mut bank) = setup(&params);
        let engine = RedemptionEngine::new(&state, &params);

        let err = engine.redeem(&mut bank, "bob", 10, None).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { required: 10, available: 0, .. }));
    }

    #[test]
    fn test_empty_reserve() {
        let params = ModuleParams::default();
        let state = StateManager::new(InMemoryStore::new());
        for class in default_reserve_classes() {
            state.save_reserve_class(&class).unwrap();
        }
        let engine = RedemptionEngine::new(&state, &params);
        assert!(matches!(
            engine.plan(1, None).unwrap_err(),
            Error::InsufficientCollateral { .. }
        ));
    }

    #[test]
    fn test_redeem_fee() {
        let params = ModuleParams::default().with_fees(0, 100);
        let (state, mut bank) = setup(&params);
        let engine = RedemptionEngine::new(&state, &params);

        let receipt = engine.redeem(&mut bank, "alice", 1000, None).unwrap();
        assert_eq!(receipt.fee, 10);
        assert_eq!(receipt.redeem_value, 990);
        assert_eq!(receipt.total_supply, 10);
        assert_eq!(bank.balance(&params.fee_collector, "ssusd"), 10);
        assert_eq!(bank.supply_of("ssusd"), 10);
        assert!(receipt.total_reserve_value >= Decimal::from(10));
    }

    #[test]
    fn test_redeem_paused() {
        let mut params = ModuleParams::default();
        params.redeem_paused = true;
        let (state, mut bank) = setup(&params);
        let engine = RedemptionEngine::new(&state, &params);
        assert_eq!(
            engine.redeem(&mut bank, "alice", 10, None).unwrap_err(),
            Error::RedeemPaused
        );
    }
}
