//! Protocol module - Core state machine and orchestration.
//!
//! This module provides the state machine that applies ssUSD messages
//! atomically, answers queries and collects the events of each block.

pub mod events;
pub mod operations;
pub mod state_machine;

pub use events::*;
pub use operations::*;
pub use state_machine::*;
