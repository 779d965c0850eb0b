//! # Core Domain Entities
//!
//! Defines the entities shared by every VoxChain subsystem.
//!
//! ## Clusters
//!
//! - **Ledger**: [`Transaction`], [`TransactionKind`], [`Block`]
//! - **Elections**: typed payloads carried inside transactions ([`payload`])
//! - **Networking**: [`PeerEntry`], the peer-catalog record
//!
//! Chain containers, validation rules, and pool logic live in `vox-chain`;
//! this crate only holds the data they operate on, so that the wire protocol
//! (`vox-p2p`) and the node runtime (`vox-node`) agree on one representation.

pub mod block;
pub mod payload;
pub mod peer;
pub mod time;
pub mod transaction;

pub use block::Block;
pub use peer::PeerEntry;
pub use transaction::{Transaction, TransactionKind};
