//! ssUSD issuance against reserve deposits.

pub mod engine;

pub use engine::*;
