//! ssUSD redemption for reserve assets.
//!
//! Payouts come from a preferred asset class when it covers the whole
//! redemption, otherwise proportionally from every class.

pub mod engine;

pub use engine::*;
