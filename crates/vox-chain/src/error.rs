//! Error types for chain validation.

use thiserror::Error;

/// Why a block or chain was rejected.
///
/// Always recoverable: the offending block or chain is discarded and the
/// node keeps running on its current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Recomputed content hash differs from the stored hash.
    #[error("block hash does not match its contents")]
    InvalidHash,

    /// `previous_hash` does not reference the predecessor.
    #[error("broken link: expected previous hash {expected:.12}, got {got:.12}")]
    InvalidLink { expected: String, got: String },

    /// Index is not predecessor + 1.
    #[error("invalid index: expected {expected}, got {got}")]
    InvalidIndex { expected: u64, got: u64 },

    /// Hash lacks the required leading-zero run.
    #[error("proof of work does not meet difficulty {difficulty}")]
    InvalidProofOfWork { difficulty: usize },

    /// A chain with no blocks at all.
    #[error("chain is empty")]
    EmptyChain,

    /// Block 0 is not a well-formed genesis block.
    #[error("invalid genesis block")]
    InvalidGenesis,

    /// A block inside a chain failed validation; carries the first failing
    /// index and the underlying cause.
    #[error("block {index} invalid: {source}")]
    BlockInvalid {
        index: u64,
        #[source]
        source: Box<ValidationError>,
    },
}
