//! Issuance engine.
//!
//! Mints ssUSD 1:1 against a reserve asset deposit:
//!
//! 1. Value the payment at current reserve prices
//! 2. Fail with `InsufficientCollateral` if it does not cover the amount
//! 3. Validate the resulting reserve composition
//! 4. Move the payment into module custody
//! 5. Credit the reserve ledger
//! 6. Mint the amount (net of the mint fee) to the requester
//! 7. Increase the recorded supply
//!
//! The engine writes through whatever store and bank it is handed. The module
//! hands it transaction-scoped overlays, so an error at any step leaves no
//! trace.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bank::BankKeeper;
use crate::core::config::ModuleParams;
use crate::core::stablecoin::{format_coins, validate_coins, Coin};
use crate::error::{Error, Result};
use crate::reserve::ledger::ReserveLedger;
use crate::reserve::pricing::AssetPricing;
use crate::storage::backend::StorageBackend;
use crate::storage::state::StateManager;
use crate::utils::constants::SSUSD_DENOM;
use crate::utils::math::{amount_to_decimal, fee_amount, safe_sub};
use crate::utils::validation::{validate_min_amount, validate_user_account};

/// Result of a successful issuance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueReceipt {
    /// Account that paid the reserves
    pub requester: String,
    /// ssUSD minted in total
    pub amount: u128,
    /// Part of `amount` paid to the fee collector
    pub fee: u128,
    /// Part of `amount` delivered to the requester
    pub net_amount: u128,
    /// Reserve assets deposited
    pub payment: Vec<Coin>,
    /// USD value of the deposit
    pub payment_value: Decimal,
    /// Total reserve value after the deposit
    pub total_reserve_value: Decimal,
    /// ssUSD supply after the issuance
    pub total_supply: u128,
}

/// Reserve-backed minting
pub struct IssuanceEngine<'a, B: StorageBackend> {
    state: &'a StateManager<B>,
    params: &'a ModuleParams,
}

impl<'a, B: StorageBackend> IssuanceEngine<'a, B> {
    /// Create an engine over `state`
    pub fn new(state: &'a StateManager<B>, params: &'a ModuleParams) -> Self {
        Self { state, params }
    }

    fn ledger(&self) -> ReserveLedger<'a, B> {
        ReserveLedger::new(self.state, self.params.allocation_policy)
    }

    /// Mint `amount` ssUSD to `requester` against `payment`
    pub fn issue<K: BankKeeper + ?Sized>(
        &self,
        bank: &mut K,
        requester: &str,
        amount: u128,
        payment: &[Coin],
    ) -> Result<IssueReceipt> {
        validate_user_account(requester, &self.params.fee_collector)?;
        let mut stablecoin = self.state.load_stablecoin(SSUSD_DENOM)?;
        stablecoin.ensure_active()?;
        if self.params.mint_paused {
            return Err(Error::MintPaused);
        }
        validate_min_amount(amount, self.params.min_issue_amount)?;
        validate_coins(payment)?;

        let ledger = self.ledger();

        let payment_value = ledger.value_of(payment)?;
        let required = amount_to_decimal(amount)?;
        if payment_value < required {
            return Err(Error::InsufficientCollateral {
                required,
                available: payment_value,
            });
        }

        ledger.validate_composition(payment)?;
        stablecoin.increase_supply(amount)?;

        bank.send_to_module(requester, payment)?;
        let total_reserve_value = ledger.deposit(payment)?;

        let fee = fee_amount(amount, self.params.mint_fee_bps)?;
        let net_amount = safe_sub(amount, fee)?;

        bank.mint(&[Coin::ssusd(amount)])?;
        if net_amount > 0 {
            bank.send_from_module(requester, &[Coin::ssusd(net_amount)])?;
        }
        if fee > 0 {
            bank.send_from_module(&self.params.fee_collector, &[Coin::ssusd(fee)])?;
        }

        self.state.save_stablecoin(&stablecoin)?;

        tracing::info!(
            requester,
            amount,
            fee,
            payment = %format_coins(payment),
            %payment_value,
            total_supply = stablecoin.total_supply,
            "Issued ssUSD"
        );

        Ok(IssueReceipt {
            requester: requester.to_string(),
            amount,
            fee,
            net_amount,
            payment: payment.to_vec(),
            payment_value,
            total_reserve_value,
            total_supply: stablecoin.total_supply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::InMemoryBank;
    use crate::core::config::AllocationPolicy;
    use crate::core::stablecoin::Stablecoin;
    use crate::reserve::ledger::default_reserve_classes;
    use crate::storage::backend::InMemoryStore;
    use crate::utils::constants::MODULE_ACCOUNT;

    fn setup(params: &ModuleParams) -> (StateManager<InMemoryStore>, InMemoryBank) {
        let state = StateManager::new(InMemoryStore::new());
        state.save_params(params).unwrap();
        state.save_stablecoin(&Stablecoin::default()).unwrap();
        for class in default_reserve_classes() {
            state.save_reserve_class(&class).unwrap();
        }

        let mut bank = InMemoryBank::new();
        bank.fund(
            "alice",
            &[
                Coin::new("treasury_bill_token", 10_000),
                Coin::new("us_cash_token", 10_000),
                Coin::new("doge", 10_000),
            ],
        )
        .unwrap();
        (state, bank)
    }

    #[test]
    fn test_issue_treasury_bills() {
        let params = ModuleParams::default();
        let (state, mut bank) = setup(&params);
        let engine = IssuanceEngine::new(&state, &params);

        let receipt = engine
            .issue(&mut bank, "alice", 1000, &[Coin::new("treasury_bill_token", 1000)])
            .unwrap();

        assert_eq!(receipt.total_supply, 1000);
        assert_eq!(receipt.total_reserve_value, Decimal::from(1000));
        assert_eq!(bank.balance("alice", "ssusd"), 1000);
        assert_eq!(bank.balance("alice", "treasury_bill_token"), 9000);
        assert_eq!(bank.balance(MODULE_ACCOUNT, "treasury_bill_token"), 1000);
        assert_eq!(
            state.load_reserve_class("treasury_bills").unwrap().unwrap().units,
            1000
        );
    }

    #[test]
    fn test_module_accounts_cannot_issue() {
        let params = ModuleParams::default();
        let (state, mut bank) = setup(&params);
        bank.fund(MODULE_ACCOUNT, &[Coin::new("treasury_bill_token", 1000)]).unwrap();
        let engine = IssuanceEngine::new(&state, &params);

        for requester in [MODULE_ACCOUNT, params.fee_collector.as_str()] {
            let err = engine
                .issue(&mut bank, requester, 1000, &[Coin::new("treasury_bill_token", 1000)])
                .unwrap_err();
            assert!(matches!(err, Error::Unauthorized(_)));
        }

        assert_eq!(
            state.load_reserve_class("treasury_bills").unwrap().unwrap().units,
            0
        );
        assert_eq!(state.load_stablecoin("ssusd").unwrap().total_supply, 0);
    }

    #[test]
    fn test_insufficient_collateral() {
        let params = ModuleParams::default();
        let (state, mut bank) = setup(&params);
        let engine = IssuanceEngine::new(&state, &params);

        let err = engine
            .issue(&mut bank, "alice", 1001, &[Coin::new("treasury_bill_token", 1000)])
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientCollateral { .. }));
    }

    #[test]
    fn test_unknown_denom() {
        let params = ModuleParams::default();
        let (state, mut bank) = setup(&params);
        let engine = IssuanceEngine::new(&state, &params);

        let err = engine
            .issue(&mut bank, "alice", 10, &[Coin::new("doge", 10)])
            .unwrap_err();
        assert_eq!(err, Error::InvalidAssetClass("doge".into()));
    }

    #[test]
    fn test_guards() {
        let mut params = ModuleParams::default();
        params.min_issue_amount = 100;
        let (state, mut bank) = setup(&params);

        {
            let engine = IssuanceEngine::new(&state, &params);
            let pay = [Coin::new("us_cash_token", 100)];
            assert_eq!(engine.issue(&mut bank, "alice", 0, &pay).unwrap_err(), Error::ZeroAmount);
            assert!(matches!(
                engine.issue(&mut bank, "alice", 99, &pay).unwrap_err(),
                Error::AmountBelowMinimum { .. }
            ));
        }

        params.mint_paused = true;
        let engine = IssuanceEngine::new(&state, &params);
        assert_eq!(
            engine
                .issue(&mut bank, "alice", 100, &[Coin::new("us_cash_token", 100)])
                .unwrap_err(),
            Error::MintPaused
        );
    }

    #[test]
    fn test_supply_cap() {
        let params = ModuleParams::default();
        let (state, mut bank) = setup(&params);
        state
            .save_stablecoin(&Stablecoin {
                max_supply: 500,
                ..Stablecoin::default()
            })
            .unwrap();
        let engine = IssuanceEngine::new(&state, &params);

        let err = engine
            .issue(&mut bank, "alice", 501, &[Coin::new("us_cash_token", 501)])
            .unwrap_err();
        assert!(matches!(err, Error::SupplyCapExceeded { resulting: 501, max: 500 }));
    }

    #[test]
    fn test_mint_fee_to_collector() {
        let params = ModuleParams::default().with_fees(50, 0);
        let (state, mut bank) = setup(&params);
        let engine = IssuanceEngine::new(&state, &params);

        let receipt = engine
            .issue(&mut bank, "alice", 1000, &[Coin::new("us_cash_token", 1000)])
            .unwrap();

        assert_eq!(receipt.fee, 5);
        assert_eq!(bank.balance("alice", "ssusd"), 995);
        assert_eq!(bank.balance(&params.fee_collector, "ssusd"), 5);
        assert_eq!(bank.supply_of("ssusd"), 1000);
    }

    #[test]
    fn test_enforced_allocation() {
        let params = ModuleParams::default()
            .with_allocation_policy(AllocationPolicy::Enforced { tolerance_bps: 500 });
        let (state, mut bank) = setup(&params);
        let engine = IssuanceEngine::new(&state, &params);

        // First deposit into an empty reserve is exempt
        engine
            .issue(&mut bank, "alice", 700, &[Coin::new("treasury_bill_token", 700)])
            .unwrap();

        // Cash would reach 50% against a 10% + 5% cap
        let err = engine
            .issue(&mut bank, "alice", 700, &[Coin::new("us_cash_token", 700)])
            .unwrap_err();
        assert!(matches!(err, Error::AllocationLimitExceeded { .. }));
    }
}
