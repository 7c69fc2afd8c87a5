//! Command line support for the `ssusd` binary.

pub mod config;

pub use config::*;
