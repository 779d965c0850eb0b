//! Wall-clock helpers.
//!
//! Timestamps travel on the wire as Unix milliseconds, matching the
//! block-hash preimage contract.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
