//! Module constants and defaults.
//!
//! All module-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// DENOMS & ACCOUNTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Denomination of the stablecoin
pub const SSUSD_DENOM: &str = "ssusd";

/// Account that holds reserve assets and performs mint/burn
pub const MODULE_ACCOUNT: &str = "ssusd_module";

/// Account that receives mint and redemption fees
pub const FEE_COLLECTOR_ACCOUNT: &str = "ssusd_fee_collector";

/// Default governance authority
pub const DEFAULT_AUTHORITY: &str = "stateset1gov";

/// Maximum ssUSD supply (1 billion ssUSD in micro units)
pub const DEFAULT_MAX_SUPPLY: u128 = 1_000_000_000_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// BASIS POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u64 = 10_000;

/// Sum every reserve class target allocation must reach
pub const FULL_ALLOCATION_BPS: u64 = BPS_DIVISOR;

// ═══════════════════════════════════════════════════════════════════════════════
// PEG CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Deviation above which the peg controller acts - 0.5%
pub const DEFAULT_REBALANCE_THRESHOLD_BPS: u64 = 50;

/// Minimum block time between two rebalancing actions (1 hour)
pub const REBALANCE_COOLDOWN_SECS: u64 = 3600;

/// Multiplier turning the controller output into an integer amount
pub const DEFAULT_REBALANCE_SCALE: u64 = 1_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default feed update frequency (5 minutes)
pub const DEFAULT_FEED_UPDATE_FREQUENCY_SECS: u64 = 300;

/// Default max deviation of a single observation - 2%
pub const DEFAULT_FEED_TOLERANCE_BPS: u64 = 200;

// ═══════════════════════════════════════════════════════════════════════════════
// STORE LIMITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Width of the zero-padded sequence number in history keys
pub const HISTORY_SEQ_WIDTH: usize = 20;
