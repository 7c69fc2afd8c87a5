//! Storage module for persistent module state.
//!
//! All module state lives in a key-value store:
//! - Price feeds
//! - Reserve asset classes
//! - Stablecoin supply
//! - Peg controller state and rebalance history
//!
//! ## Backends
//!
//! - **InMemoryStore**: Fast, ephemeral storage for testing
//! - **FileStore**: JSON file-based persistence for the replay binary
//! - **CacheStore**: Per-transaction overlay, committed only on success
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ssusd::storage::{InMemoryStore, StateManager};
//!
//! let state = StateManager::new(InMemoryStore::new());
//! let feeds = state.load_all_feeds()?;
//! ```

pub mod backend;
pub mod state;

pub use backend::*;
pub use state::*;
