//! Module parameters.
//!
//! This module defines all configurable parameters for the ssUSD module.
//! Every field can be replaced through an `UpdateParams` governance message;
//! the whole set is validated before it is stored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::validation::{validate_address, validate_bps, validate_price};

// ═══════════════════════════════════════════════════════════════════════════════
// PID CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Gains and limits of the peg controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidConfig {
    /// Proportional gain
    pub kp: Decimal,
    /// Integral gain
    pub ki: Decimal,
    /// Derivative gain
    pub kd: Decimal,
    /// Absolute bound on the accumulated integral term
    pub integral_limit: Decimal,
    /// Outputs with `|u| <= output_dead_band` produce no supply action
    pub output_dead_band: Decimal,
    /// Multiplier turning `|u|` into an integer amount
    pub rebalance_scale: u64,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: Decimal::new(1, 1),  // 0.1
            ki: Decimal::new(5, 2),  // 0.05
            kd: Decimal::new(2, 2),  // 0.02
            integral_limit: Decimal::from(100),
            output_dead_band: Decimal::ZERO,
            rebalance_scale: DEFAULT_REBALANCE_SCALE,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ALLOCATION POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// How target allocations constrain reserve deposits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Drift from target is logged and reported but never blocks a deposit
    Advisory,
    /// A deposit fails if any class ends above `target + tolerance_bps`
    Enforced {
        /// Allowed overshoot in basis points of total reserve value
        tolerance_bps: u64,
    },
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self::Advisory
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODULE PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Governable parameters of the ssUSD module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleParams {
    /// Account allowed to send governance messages
    pub authority: String,

    /// Peg target in USD
    pub target_price: Decimal,

    /// Deviation from target (bps) above which the controller acts
    pub rebalance_threshold_bps: u64,

    /// Minimum block time between two rebalancing actions
    pub rebalance_cooldown_secs: u64,

    /// Peg controller tuning
    pub pid: PidConfig,

    /// Fee on issuance, paid in ssUSD to the fee collector
    pub mint_fee_bps: u64,

    /// Fee on redemption, paid in ssUSD to the fee collector
    pub redeem_fee_bps: u64,

    /// Account receiving fees
    pub fee_collector: String,

    /// Smallest accepted issuance in base units
    pub min_issue_amount: u128,

    /// Smallest accepted redemption in base units
    pub min_redeem_amount: u128,

    /// Reject all issuance
    pub mint_paused: bool,

    /// Reject all redemption
    pub redeem_paused: bool,

    /// Allocation cap policy for deposits
    pub allocation_policy: AllocationPolicy,

    /// Freeze the price at target and disable the peg controller
    pub emergency_mode: bool,

    /// Reporters allowed to submit prices; empty means anyone
    pub oracle_whitelist: Vec<String>,
}

impl Default for ModuleParams {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            target_price: Decimal::ONE,
            rebalance_threshold_bps: DEFAULT_REBALANCE_THRESHOLD_BPS,
            rebalance_cooldown_secs: REBALANCE_COOLDOWN_SECS,
            pid: PidConfig::default(),
            mint_fee_bps: 0,
            redeem_fee_bps: 0,
            fee_collector: FEE_COLLECTOR_ACCOUNT.to_string(),
            min_issue_amount: 1,
            min_redeem_amount: 1,
            mint_paused: false,
            redeem_paused: false,
            allocation_policy: AllocationPolicy::Advisory,
            emergency_mode: false,
            oracle_whitelist: Vec::new(),
        }
    }
}

impl ModuleParams {
    /// Set the governance authority
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    /// Set mint and redeem fees
    pub fn with_fees(mut self, mint_fee_bps: u64, redeem_fee_bps: u64) -> Self {
        self.mint_fee_bps = mint_fee_bps;
        self.redeem_fee_bps = redeem_fee_bps;
        self
    }

    /// Set the allocation policy
    pub fn with_allocation_policy(mut self, policy: AllocationPolicy) -> Self {
        self.allocation_policy = policy;
        self
    }

    /// Set the oracle reporter whitelist
    pub fn with_oracle_whitelist(mut self, reporters: Vec<String>) -> Self {
        self.oracle_whitelist = reporters;
        self
    }

    /// Whether `reporter` may submit price observations
    pub fn is_reporter_allowed(&self, reporter: &str) -> bool {
        reporter == self.authority
            || self.oracle_whitelist.is_empty()
            || self.oracle_whitelist.iter().any(|r| r == reporter)
    }

    /// Fail unless `signer` is the module authority
    pub fn ensure_authority(&self, signer: &str) -> Result<()> {
        if signer != self.authority {
            return Err(Error::Unauthorized(format!(
                "{} is not the module authority",
                signer
            )));
        }
        Ok(())
    }

    /// Validate parameters are consistent
    pub fn validate(&self) -> Result<()> {
        validate_address(&self.authority)?;
        validate_address(&self.fee_collector)?;
        validate_price("target_price", self.target_price)?;
        validate_bps("rebalance_threshold_bps", self.rebalance_threshold_bps)?;
        validate_bps("mint_fee_bps", self.mint_fee_bps)?;
        validate_bps("redeem_fee_bps", self.redeem_fee_bps)?;

        if let AllocationPolicy::Enforced { tolerance_bps } = self.allocation_policy {
            validate_bps("allocation_policy.tolerance_bps", tolerance_bps)?;
        }

        let pid = &self.pid;
        if pid.kp.is_sign_negative() || pid.ki.is_sign_negative() || pid.kd.is_sign_negative() {
            return Err(Error::InvalidParameter {
                name: "pid".into(),
                reason: "gains must be non-negative".into(),
            });
        }
        if pid.integral_limit <= Decimal::ZERO {
            return Err(Error::InvalidParameter {
                name: "pid.integral_limit".into(),
                reason: "must be positive".into(),
            });
        }
        if pid.output_dead_band.is_sign_negative() {
            return Err(Error::InvalidParameter {
                name: "pid.output_dead_band".into(),
                reason: "must be non-negative".into(),
            });
        }
        if pid.rebalance_scale == 0 {
            return Err(Error::InvalidParameter {
                name: "pid.rebalance_scale".into(),
                reason: "must be positive".into(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_valid() {
        let params = ModuleParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.target_price, Decimal::ONE);
        assert_eq!(params.rebalance_cooldown_secs, 3600);
        assert_eq!(params.pid.kp, Decimal::new(1, 1));
    }

    #[test]
    fn test_invalid_params() {
        let mut params = ModuleParams::default().with_fees(10_001, 0);
        assert!(params.validate().is_err());

        params = ModuleParams::default();
        params.target_price = Decimal::ZERO;
        assert!(params.validate().is_err());

        params = ModuleParams::default();
        params.pid.kd = Decimal::new(-1, 2);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_reporter_whitelist() {
        let open = ModuleParams::default();
        assert!(open.is_reporter_allowed("anyone"));

        let closed = ModuleParams::default().with_oracle_whitelist(vec!["oracle1".into()]);
        assert!(closed.is_reporter_allowed("oracle1"));
        assert!(closed.is_reporter_allowed(DEFAULT_AUTHORITY));
        assert!(!closed.is_reporter_allowed("mallory"));
    }

    #[test]
    fn test_authority() {
        let params = ModuleParams::default().with_authority("gov");
        assert!(params.ensure_authority("gov").is_ok());
        assert!(matches!(params.ensure_authority("bob"), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_params_json_roundtrip() {
        let params = ModuleParams::default()
            .with_allocation_policy(AllocationPolicy::Enforced { tolerance_bps: 500 });
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"enforced\":{\"tolerance_bps\":500}"));
        let parsed: ModuleParams = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, params);
    }
}
