//! Peer-catalog records.

use serde::{Deserialize, Serialize};

use crate::time::now_millis;

/// A known peer address — an address-book entry, not a live connection.
///
/// Gossiped between nodes in `PeersResponse` messages and merged
/// (deduplicated by id) into each node's catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerEntry {
    /// Declared node id.
    pub id: String,
    /// Hostname or IP address.
    pub address: String,
    /// TCP port the peer listens on.
    pub port: u16,
    /// When this node last heard from (or about) the peer, Unix millis.
    pub last_contact_ms: u64,
    /// Whether this node currently believes a connection exists.
    pub active: bool,
}

impl PeerEntry {
    pub fn new(id: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            port,
            last_contact_ms: now_millis(),
            active: false,
        }
    }

    /// `host:port` form used when dialing.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl std::fmt::Display for PeerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) {}",
            self.id,
            self.endpoint(),
            if self.active { "active" } else { "inactive" }
        )
    }
}
