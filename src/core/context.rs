//! Block context supplied by the host ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Height and time of the block currently being applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    /// Block height
    pub height: u64,
    /// Block time in unix seconds
    pub time: u64,
}

impl BlockContext {
    /// Create a new block context
    pub fn new(height: u64, time: u64) -> Self {
        Self { height, time }
    }

    /// Block time as RFC 3339, or the raw seconds if out of range
    pub fn time_rfc3339(&self) -> String {
        i64::try_from(self.time)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| self.time.to_string())
    }
}
