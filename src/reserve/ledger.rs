//! Reserve ledger.
//!
//! Tracks how many units of each reserve asset class the module holds, the
//! USD price of each class, and the target allocation across classes. The
//! ledger is a thin view over the store: every call reads the current class
//! records and writes back the ones it changes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::config::AllocationPolicy;
use crate::core::stablecoin::Coin;
use crate::error::{Error, Result};
use crate::reserve::pricing::AssetPricing;
use crate::storage::backend::StorageBackend;
use crate::storage::state::StateManager;
use crate::utils::constants::FULL_ALLOCATION_BPS;
use crate::utils::math::*;
use crate::utils::validation::{validate_bps, validate_identifier, validate_price};

// ═══════════════════════════════════════════════════════════════════════════════
// RESERVE ASSET CLASS
// ═══════════════════════════════════════════════════════════════════════════════

/// One class of reserve assets (cash, T-bills, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveAssetClass {
    /// Class identifier (e.g. `treasury_bills`)
    pub class_id: String,
    /// Denom of the tokenized asset (e.g. `treasury_bill_token`)
    pub denom: String,
    /// Fixed position used to order classes during redemption
    pub position: u32,
    /// Target share of total reserve value, in bps
    pub target_allocation_bps: u64,
    /// Units held by the module
    pub units: u128,
    /// USD price of one unit
    pub price: Decimal,
    /// Informational risk weight
    pub risk_weight: Decimal,
}

impl ReserveAssetClass {
    /// Create an empty class priced at 1.0
    pub fn new(
        class_id: impl Into<String>,
        denom: impl Into<String>,
        position: u32,
        target_allocation_bps: u64,
        risk_weight: Decimal,
    ) -> Self {
        Self {
            class_id: class_id.into(),
            denom: denom.into(),
            position,
            target_allocation_bps,
            units: 0,
            price: Decimal::ONE,
            risk_weight,
        }
    }

    /// Current USD value of the units held
    pub fn value(&self) -> Result<Decimal> {
        dec_mul(amount_to_decimal(self.units)?, self.price)
    }

    /// Whether `asset` names this class by denom or class id
    pub fn matches(&self, asset: &str) -> bool {
        self.denom == asset || self.class_id == asset
    }

    /// Validate stored fields
    pub fn validate(&self) -> Result<()> {
        validate_identifier("class_id", &self.class_id)?;
        validate_identifier("denom", &self.denom)?;
        validate_bps("target_allocation_bps", self.target_allocation_bps)?;
        validate_price(&self.denom, self.price)?;
        if self.risk_weight.is_sign_negative() {
            return Err(Error::InvalidParameter {
                name: "risk_weight".into(),
                reason: "must be non-negative".into(),
            });
        }
        Ok(())
    }
}

/// Conservative reserve composition: cash 10%, T-bills 70%, government MMFs 15%, repos 5%
pub fn default_reserve_classes() -> Vec<ReserveAssetClass> {
    vec![
        ReserveAssetClass::new("us_cash", "us_cash_token", 0, 1_000, Decimal::ZERO),
        ReserveAssetClass::new("treasury_bills", "treasury_bill_token", 1, 7_000, Decimal::ZERO),
        ReserveAssetClass::new("government_mmfs", "mmf_token", 2, 1_500, Decimal::new(5, 2)),
        ReserveAssetClass::new("overnight_repos", "repo_token", 3, 500, Decimal::new(10, 2)),
    ]
}

/// Check a full set of classes: valid fields, unique ids and denoms, targets summing to 100%
pub fn validate_class_set(classes: &[ReserveAssetClass]) -> Result<()> {
    let mut ids = BTreeSet::new();
    let mut denoms = BTreeSet::new();
    let mut total_bps = 0u64;

    for class in classes {
        class.validate()?;
        if !ids.insert(class.class_id.as_str()) || !denoms.insert(class.denom.as_str()) {
            return Err(Error::InvalidParameter {
                name: "reserve_classes".into(),
                reason: format!("duplicate class {} / {}", class.class_id, class.denom),
            });
        }
        total_bps = total_bps.saturating_add(class.target_allocation_bps);
    }

    if total_bps != FULL_ALLOCATION_BPS {
        return Err(Error::InvalidParameter {
            name: "target_allocation_bps".into(),
            reason: format!(
                "target allocations sum to {} bps, expected {}",
                total_bps, FULL_ALLOCATION_BPS
            ),
        });
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPOSITION REPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-class line of the composition report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassComposition {
    /// Class identifier
    pub class_id: String,
    /// Asset denom
    pub denom: String,
    /// Units held
    pub units: u128,
    /// Unit price
    pub price: Decimal,
    /// USD value held
    pub value: Decimal,
    /// Target share in bps
    pub target_allocation_bps: u64,
    /// Current share in bps (0 when the reserve is empty)
    pub current_allocation_bps: u64,
    /// Current minus target, in bps
    pub drift_bps: i64,
    /// Informational risk weight
    pub risk_weight: Decimal,
}

/// Snapshot of the whole reserve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveComposition {
    /// Classes in fixed order
    pub classes: Vec<ClassComposition>,
    /// Sum of class values
    pub total_value: Decimal,
    /// Outstanding ssUSD supply
    pub outstanding_supply: u128,
    /// `total_value / outstanding_supply`, absent when nothing is outstanding
    pub reserve_ratio: Option<Decimal>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESERVE LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// View over the persisted reserve classes
pub struct ReserveLedger<'a, B: StorageBackend> {
    state: &'a StateManager<B>,
    policy: AllocationPolicy,
}

impl<'a, B: StorageBackend> ReserveLedger<'a, B> {
    /// Create a ledger over `state` using the given allocation policy
    pub fn new(state: &'a StateManager<B>, policy: AllocationPolicy) -> Self {
        Self { state, policy }
    }

    /// All classes in fixed order
    pub fn classes(&self) -> Result<Vec<ReserveAssetClass>> {
        self.state.load_reserve_classes()
    }

    /// Class holding `denom`
    pub fn class_by_denom(&self, denom: &str) -> Result<ReserveAssetClass> {
        self.classes()?
            .into_iter()
            .find(|c| c.denom == denom)
            .ok_or_else(|| Error::InvalidAssetClass(denom.to_string()))
    }

    /// Class named by denom or class id, if any
    pub fn find_class(&self, asset: &str) -> Result<Option<ReserveAssetClass>> {
        Ok(self.classes()?.into_iter().find(|c| c.matches(asset)))
    }

    /// `Σ units × price` over all classes
    pub fn total_value(&self) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        for class in self.classes()? {
            total = dec_add(total, class.value()?)?;
        }
        Ok(total)
    }

    /// Add units to their classes and return the new total value
    pub fn deposit(&self, assets: &[Coin]) -> Result<Decimal> {
        let mut classes = self.classes()?;

        for coin in assets {
            let class = classes
                .iter_mut()
                .find(|c| c.denom == coin.denom)
                .ok_or_else(|| Error::InvalidAssetClass(coin.denom.clone()))?;
            class.units = safe_add(class.units, coin.amount)?;
        }

        self.store_and_total(&classes)
    }

    /// Remove units from their classes and return the new total value
    pub fn withdraw(&self, assets: &[Coin]) -> Result<Decimal> {
        let mut classes = self.classes()?;

        for coin in assets {
            let class = classes
                .iter_mut()
                .find(|c| c.denom == coin.denom)
                .ok_or_else(|| Error::InvalidAssetClass(coin.denom.clone()))?;

            if class.units < coin.amount {
                return Err(Error::InsufficientCollateral {
                    required: dec_mul(amount_to_decimal(coin.amount)?, class.price)?,
                    available: class.value()?,
                });
            }
            class.units -= coin.amount;
        }

        self.store_and_total(&classes)
    }

    fn store_and_total(&self, classes: &[ReserveAssetClass]) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        for class in classes {
            self.state.save_reserve_class(class)?;
            total = dec_add(total, class.value()?)?;
        }
        Ok(total)
    }

    /// Check that every denom in `payment` is a reserve asset and that the
    /// resulting allocation satisfies the configured policy.
    pub fn validate_composition(&self, payment: &[Coin]) -> Result<()> {
        let classes = self.classes()?;

        let mut touched = Vec::with_capacity(payment.len());
        for coin in payment {
            let idx = classes
                .iter()
                .position(|c| c.denom == coin.denom)
                .ok_or_else(|| Error::InvalidAssetClass(coin.denom.clone()))?;
            touched.push((idx, coin.amount));
        }

        let mut current_total = Decimal::ZERO;
        for class in &classes {
            current_total = dec_add(current_total, class.value()?)?;
        }

        // The first deposit into an empty reserve cannot match any split
        if current_total.is_zero() {
            return Ok(());
        }

        let payment_value = self.value_of(payment)?;
        let new_total = dec_add(current_total, payment_value)?;

        for (idx, amount) in touched {
            let class = &classes[idx];
            let new_units = safe_add(class.units, amount)?;
            let new_value = dec_mul(amount_to_decimal(new_units)?, class.price)?;
            let allocation_bps = decimal_to_bps(dec_div(new_value, new_total)?);

            match self.policy {
                AllocationPolicy::Advisory => {
                    if allocation_bps > class.target_allocation_bps {
                        tracing::warn!(
                            class = %class.class_id,
                            allocation_bps,
                            target_bps = class.target_allocation_bps,
                            "Deposit moves reserve class above target allocation"
                        );
                    }
                }
                AllocationPolicy::Enforced { tolerance_bps } => {
                    let max_bps = class.target_allocation_bps.saturating_add(tolerance_bps);
                    if allocation_bps > max_bps {
                        return Err(Error::AllocationLimitExceeded {
                            class_id: class.class_id.clone(),
                            allocation_bps,
                            max_bps,
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Composition report against the given outstanding supply
    pub fn composition(&self, outstanding_supply: u128) -> Result<ReserveComposition> {
        let classes = self.classes()?;
        let total_value = self.total_value()?;

        let mut lines = Vec::with_capacity(classes.len());
        for class in classes {
            let value = class.value()?;
            let current_allocation_bps = if total_value.is_zero() {
                0
            } else {
                decimal_to_bps(dec_div(value, total_value)?)
            };
            lines.push(ClassComposition {
                drift_bps: current_allocation_bps as i64 - class.target_allocation_bps as i64,
                class_id: class.class_id,
                denom: class.denom,
                units: class.units,
                price: class.price,
                value,
                target_allocation_bps: class.target_allocation_bps,
                current_allocation_bps,
                risk_weight: class.risk_weight,
            });
        }

        let reserve_ratio = if outstanding_supply == 0 {
            None
        } else {
            Some(dec_div(total_value, amount_to_decimal(outstanding_supply)?)?)
        };

        Ok(ReserveComposition {
            classes: lines,
            total_value,
            outstanding_supply,
            reserve_ratio,
        })
    }

    /// Reprice one reserve asset
    pub fn set_asset_price(&self, denom: &str, price: Decimal) -> Result<ReserveAssetClass> {
        validate_price(denom, price)?;
        let mut class = self.class_by_denom(denom)?;
        class.price = price;
        self.state.save_reserve_class(&class)?;
        Ok(class)
    }
}

impl<'a, B: StorageBackend> AssetPricing for ReserveLedger<'a, B> {
    fn price_of(&self, denom: &str) -> Result<Decimal> {
        Ok(self.class_by_denom(denom)?.price)
    }
}
