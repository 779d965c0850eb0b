//! Node configuration.
//!
//! Layered TOML: a config file (path from `VOX_CONFIG`, default
//! `voxchain.toml`), with every field defaulted so a missing file yields a
//! runnable single-node setup, then the `VOX_NODE_ID` and `VOX_P2P_PORT`
//! environment overrides on top. Parse errors are fatal; a missing file is
//! not.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;
use vox_chain::ResolutionStrategy;
use vox_types::PeerEntry;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "voxchain.toml";
pub const ENV_CONFIG: &str = "VOX_CONFIG";
pub const ENV_NODE_ID: &str = "VOX_NODE_ID";
pub const ENV_P2P_PORT: &str = "VOX_P2P_PORT";

/// Complete runtime configuration for one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's identity in envelopes, blocks, and peer catalogs.
    pub id: String,
    /// Listener bind address.
    pub host: IpAddr,
    /// Listener port. `0` asks the OS for an ephemeral port.
    pub port: u16,
    pub chain: ChainSettings,
    pub mining: MiningSettings,
    pub discovery: DiscoverySettings,
    /// Seed peers dialed at startup.
    pub bootstrap: Vec<BootstrapPeer>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: "TSE-SP".to_string(),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8001,
            chain: ChainSettings::default(),
            mining: MiningSettings::default(),
            discovery: DiscoverySettings::default(),
            bootstrap: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    /// Required number of leading zero hex characters in a block hash.
    pub difficulty: usize,
    /// Maximum transactions per block.
    pub block_tx_limit: usize,
    /// How far behind the tip an inbound block may be before it is ignored
    /// outright instead of triggering a chain fetch from its sender.
    pub fork_depth_tolerance: u64,
    /// Fork arbitration policy. Every node in a deployment must agree.
    pub fork_strategy: ResolutionStrategy,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            difficulty: 2,
            block_tx_limit: 5,
            fork_depth_tolerance: 0,
            fork_strategy: ResolutionStrategy::LongestChain,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningSettings {
    /// Minimum interval between scheduled mining attempts.
    pub cooldown_ms: u64,
    /// How often the scheduled miner checks the pool.
    pub poll_interval_ms: u64,
}

impl Default for MiningSettings {
    fn default() -> Self {
        Self {
            cooldown_ms: 2_000,
            poll_interval_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Reconnect sweep over inactive catalog entries.
    pub connect_interval_secs: u64,
    /// Ping sweep over live connections.
    pub health_check_interval_secs: u64,
    /// Catalog gossip broadcast.
    pub gossip_interval_secs: u64,
    /// A failed or fresh contact is not redialed until this much time
    /// passed since the last attempt.
    pub retry_cooldown_ms: u64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            connect_interval_secs: 5,
            health_check_interval_secs: 10,
            gossip_interval_secs: 15,
            retry_cooldown_ms: 2_000,
        }
    }
}

/// A seed peer as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapPeer {
    pub id: String,
    pub host: String,
    pub port: u16,
}

impl BootstrapPeer {
    pub fn to_entry(&self) -> PeerEntry {
        PeerEntry::new(&self.id, &self.host, self.port)
    }
}

impl NodeConfig {
    /// Load from the configured path, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(ENV_CONFIG).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse `path`, falling back to defaults when the file does not exist.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(id) = std::env::var(ENV_NODE_ID) {
            if !id.is_empty() {
                self.id = id;
            }
        }
        if let Ok(port) = std::env::var(ENV_P2P_PORT) {
            self.port = port.parse().map_err(|_| ConfigError::EnvOverride {
                var: ENV_P2P_PORT,
                value: port,
            })?;
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Bootstrap entries, this node's own id excluded.
    pub fn bootstrap_entries(&self) -> Vec<PeerEntry> {
        self.bootstrap
            .iter()
            .filter(|p| p.id != self.id)
            .map(BootstrapPeer::to_entry)
            .collect()
    }
}
