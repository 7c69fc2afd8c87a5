//! Error types for the ssUSD module.
//!
//! Every failure a transaction can surface is a variant here. A failed
//! transaction is reverted as a whole, so callers only ever see the error,
//! never a partially applied state.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias for ssUSD operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ssUSD module
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Oracle Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Observation is stale or deviates too far from the weighted price
    #[error("Stale or deviating price from {source_id}: {reason}")]
    StaleOrDeviatingPrice {
        /// Feed source that reported the price
        source_id: String,
        /// Human readable cause
        reason: String,
    },

    /// Price feed has not been registered
    #[error("Unknown price feed: {0}")]
    UnknownFeed(String),

    /// Price feed is already registered
    #[error("Price feed already registered: {0}")]
    FeedAlreadyExists(String),

    /// Price must be strictly positive
    #[error("Invalid price {price} for {subject}")]
    InvalidPrice {
        /// Feed source or asset denom
        subject: String,
        /// Offending price
        price: Decimal,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Reserve Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Denom is not a registered reserve asset class
    #[error("Invalid reserve asset class: {0}")]
    InvalidAssetClass(String),

    /// Reserve value does not cover the requested amount
    #[error("Insufficient collateral: required {required}, available {available}")]
    InsufficientCollateral {
        /// Value required
        required: Decimal,
        /// Value available
        available: Decimal,
    },

    /// Deposit would push a class over its allocation cap
    #[error("Allocation of {class_id} would be {allocation_bps} bps, max is {max_bps} bps")]
    AllocationLimitExceeded {
        /// Reserve class identifier
        class_id: String,
        /// Post-deposit allocation in basis points
        allocation_bps: u64,
        /// Maximum allowed allocation in basis points
        max_bps: u64,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Supply Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Account balance too low
    #[error("Insufficient funds for {denom}: required {required}, available {available}")]
    InsufficientFunds {
        /// Denomination checked
        denom: String,
        /// Amount required
        required: u128,
        /// Amount available
        available: u128,
    },

    /// Stablecoin not found in state
    #[error("Stablecoin not found: {0}")]
    StablecoinNotFound(String),

    /// Stablecoin is deactivated
    #[error("Stablecoin is not active: {0}")]
    StablecoinInactive(String),

    /// Issuance is paused
    #[error("Minting is paused")]
    MintPaused,

    /// Redemption is paused
    #[error("Redemption is paused")]
    RedeemPaused,

    /// Issuance would exceed max supply
    #[error("Supply cap exceeded: resulting supply {resulting}, max {max}")]
    SupplyCapExceeded {
        /// Supply after the operation
        resulting: u128,
        /// Configured maximum supply
        max: u128,
    },

    /// Amount below configured minimum
    #[error("Amount {amount} below minimum {minimum}")]
    AmountBelowMinimum {
        /// Requested amount
        amount: u128,
        /// Configured minimum
        minimum: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Signer is not allowed to perform this action
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Amount is zero
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    Underflow {
        /// Operation that underflowed
        operation: String,
    },

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ═══════════════════════════════════════════════════════════════════
    // Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Returns true if resubmitting later (with different inputs or state) may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::StaleOrDeviatingPrice { .. }
                | Error::InsufficientCollateral { .. }
                | Error::InsufficientFunds { .. }
                | Error::AllocationLimitExceeded { .. }
                | Error::MintPaused
                | Error::RedeemPaused
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_)
                | Error::Internal(_)
                | Error::Storage(_)
                | Error::Overflow { .. }
                | Error::Underflow { .. }
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Oracle errors: 1xxx
            Error::StaleOrDeviatingPrice { .. } => 1001,
            Error::UnknownFeed(_) => 1002,
            Error::FeedAlreadyExists(_) => 1003,
            Error::InvalidPrice { .. } => 1004,

            // Reserve errors: 2xxx
            Error::InvalidAssetClass(_) => 2001,
            Error::InsufficientCollateral { .. } => 2002,
            Error::AllocationLimitExceeded { .. } => 2003,

            // Supply errors: 3xxx
            Error::InsufficientFunds { .. } => 3001,
            Error::StablecoinNotFound(_) => 3002,
            Error::StablecoinInactive(_) => 3003,
            Error::MintPaused => 3004,
            Error::RedeemPaused => 3005,
            Error::SupplyCapExceeded { .. } => 3006,
            Error::AmountBelowMinimum { .. } => 3007,

            // Authorization errors: 4xxx
            Error::Unauthorized(_) => 4001,

            // Validation errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::ZeroAmount => 5002,
            Error::Overflow { .. } => 5003,
            Error::Underflow { .. } => 5004,
            Error::InvariantViolation(_) => 5005,

            // Serialization errors: 7xxx
            Error::Serialization(_) => 7001,
            Error::Deserialization(_) => 7002,

            // Internal errors: 9xxx
            Error::Internal(_) => 9001,
            Error::Storage(_) => 9002,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            Error::StaleOrDeviatingPrice { source_id: "".into(), reason: "".into() }.code(),
            Error::UnknownFeed("".into()).code(),
            Error::InvalidAssetClass("".into()).code(),
            Error::InsufficientCollateral { required: Decimal::ZERO, available: Decimal::ZERO }.code(),
            Error::InsufficientFunds { denom: "".into(), required: 0, available: 0 }.code(),
            Error::MintPaused.code(),
            Error::Unauthorized("".into()).code(),
            Error::ZeroAmount.code(),
            Error::Internal("".into()).code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientCollateral {
            required: Decimal::from(1000),
            available: Decimal::from(500),
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::InsufficientFunds { denom: "ssusd".into(), required: 1, available: 0 }.is_recoverable());
        assert!(!Error::InvalidAssetClass("doge".into()).is_recoverable());
        assert!(!Error::Internal("test".into()).is_recoverable());
    }

    #[test]
    fn test_is_critical() {
        assert!(Error::InvariantViolation("test".into()).is_critical());
        assert!(Error::Overflow { operation: "test".into() }.is_critical());
        assert!(!Error::UnknownFeed("test".into()).is_critical());
    }
}
