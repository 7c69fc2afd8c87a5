//! Utility modules for the ssUSD module.
//!
//! This module contains shared utilities:
//! - Decimal and integer arithmetic
//! - Validation helpers
//! - Constants

pub mod constants;
pub mod math;
pub mod validation;

pub use constants::*;
pub use math::*;
pub use validation::*;
