//! Block and chain validation.
//!
//! All checks are total functions with no side effects, so the miner, the
//! peer dispatch, and the synchronizer can share one validator without
//! coordination.

use vox_types::block::GENESIS_PREVIOUS_HASH;
use vox_types::Block;

use crate::error::ValidationError;

/// Validates single blocks against their predecessor and whole chains
/// against the genesis rules.
#[derive(Debug, Clone, Copy)]
pub struct BlockValidator {
    difficulty: usize,
}

impl BlockValidator {
    pub fn new(difficulty: usize) -> Self {
        Self { difficulty }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Validate `block` as the immediate successor of `previous`.
    ///
    /// Check order mirrors severity: content integrity, linkage, position,
    /// then proof-of-work.
    pub fn validate_block(&self, block: &Block, previous: &Block) -> Result<(), ValidationError> {
        if block.hash != block.compute_hash() {
            return Err(ValidationError::InvalidHash);
        }
        if block.previous_hash != previous.hash {
            return Err(ValidationError::InvalidLink {
                expected: previous.hash.clone(),
                got: block.previous_hash.clone(),
            });
        }
        if block.index != previous.index + 1 {
            return Err(ValidationError::InvalidIndex {
                expected: previous.index + 1,
                got: block.index,
            });
        }
        if !block.meets_difficulty(self.difficulty) {
            return Err(ValidationError::InvalidProofOfWork {
                difficulty: self.difficulty,
            });
        }
        Ok(())
    }

    /// Validate an entire chain: genesis shape, then every consecutive pair.
    ///
    /// Surfaces the first failing index wrapped in
    /// [`ValidationError::BlockInvalid`].
    pub fn validate_chain(&self, blocks: &[Block]) -> Result<(), ValidationError> {
        let genesis = blocks.first().ok_or(ValidationError::EmptyChain)?;

        if genesis.index != 0 || genesis.previous_hash != GENESIS_PREVIOUS_HASH {
            return Err(ValidationError::InvalidGenesis);
        }

        for pair in blocks.windows(2) {
            let (previous, block) = (&pair[0], &pair[1]);
            self.validate_block(block, previous)
                .map_err(|source| ValidationError::BlockInvalid {
                    index: block.index,
                    source: Box::new(source),
                })?;
        }

        Ok(())
    }
}
