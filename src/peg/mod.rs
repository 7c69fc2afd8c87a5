//! Peg stability.
//!
//! This module provides:
//! - A decimal PID controller with anti-windup and a dead band
//! - The peg state machine over {Stable, Deviated, Rebalancing}
//! - The append-only rebalance history

pub mod controller;
pub mod pid;

pub use controller::*;
pub use pid::*;
