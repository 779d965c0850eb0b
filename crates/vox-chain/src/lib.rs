//! # Chain Core
//!
//! Pure domain logic for the VoxChain ledger: the block chain container,
//! block and chain validation, the pending-transaction pool, and the two
//! consensus arbiters (baseline longest-chain synchronizer and the richer
//! fork-aware conflict resolver).
//!
//! Everything here is synchronous and side-effect free apart from mutating
//! the containers it owns — no I/O, no clocks beyond the timestamps already
//! carried on the data. The node runtime wraps these types in a single
//! mutex-guarded facade and drives them from its peer, miner, and discovery
//! tasks.

pub mod domain;
pub mod error;
pub mod sync;

pub use domain::chain::Chain;
pub use domain::pool::TransactionPool;
pub use domain::validation::BlockValidator;
pub use error::ValidationError;
pub use sync::conflict_resolver::{
    ConflictKind, ConflictResolver, ForkAnalysis, Resolution, ResolutionStrategy,
};
pub use sync::synchronizer::{ChainSynchronizer, SyncOutcome};
