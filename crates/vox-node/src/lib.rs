//! # Node Runtime
//!
//! Wires the chain core and the wire protocol into a running node:
//!
//! - [`config`]: layered TOML configuration with environment overrides.
//! - [`ledger`]: the mutex-guarded facade over the chain and the pool —
//!   the single critical section behind every commit decision.
//! - [`miner`]: candidate construction, the blocking proof-of-work search,
//!   and the scheduled mining loop.
//! - [`node`]: listener, per-peer read loops, message dispatch, and the
//!   periodic discovery tasks.

pub mod config;
pub mod error;
pub mod ledger;
pub mod miner;
pub mod node;

pub use config::NodeConfig;
pub use error::{ConfigError, NodeError};
pub use ledger::{CommitOutcome, Ledger, RemoteChainVerdict};
pub use miner::{MineOutcome, Miner};
pub use node::Node;
