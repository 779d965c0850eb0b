//! Chain container.
//!
//! Owns the ordered block list and nothing else. Appends are assumed to be
//! pre-validated by the caller; `replace` is the atomic whole-chain swap
//! used after a successful synchronization decision.

use vox_types::{Block, Transaction};

/// The replicated, append-only block chain, seeded with a mined genesis.
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: usize,
}

impl Chain {
    /// Create a chain holding only the genesis block, mined to `difficulty`.
    pub fn new(difficulty: usize) -> Self {
        let mut genesis = Block::genesis();
        genesis.mine(difficulty);
        Self {
            blocks: vec![genesis],
            difficulty,
        }
    }

    /// Append a block the caller has already validated.
    ///
    /// This call never re-validates; validation belongs to the commit path
    /// that decided the block was acceptable.
    pub fn append(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Swap the whole chain for `blocks`.
    ///
    /// Only the synchronizer calls this, and only after the replacement
    /// passed full-chain validation. Atomic: the old chain is discarded in
    /// one move.
    pub fn replace(&mut self, blocks: Vec<Block>) {
        self.blocks = blocks;
    }

    /// Tip of the chain. The genesis block guarantees non-emptiness.
    pub fn last(&self) -> &Block {
        self.blocks
            .last()
            .expect("chain always holds at least the genesis block")
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Owned copy of the block list, for wire responses and sync decisions.
    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Transactions committed so far, genesis excluded.
    pub fn total_transactions(&self) -> usize {
        self.blocks
            .iter()
            .skip(1)
            .map(|b| b.transactions.len())
            .sum()
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Build an unmined candidate extending the current tip.
    pub fn candidate(
        &self,
        transactions: Vec<Transaction>,
        miner_id: &str,
        timestamp_ms: Option<u64>,
    ) -> Block {
        Block::new(
            self.len(),
            transactions,
            self.last().hash.clone(),
            miner_id.to_string(),
            timestamp_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_types::{Transaction, TransactionKind};

    const DIFFICULTY: usize = 1;

    fn tx(n: u64) -> Transaction {
        Transaction::with_timestamp(TransactionKind::Vote, &n, "TSE-SP", n).unwrap()
    }

    fn mined_child(chain: &Chain, txs: Vec<Transaction>) -> Block {
        let mut block = chain.candidate(txs, "TSE-SP", Some(1_700_000_100_000));
        block.mine(DIFFICULTY);
        block
    }

    #[test]
    fn new_chain_holds_a_mined_genesis() {
        let chain = Chain::new(DIFFICULTY);
        assert_eq!(chain.len(), 1);
        assert!(chain.last().meets_difficulty(DIFFICULTY));
        assert_eq!(chain.last().index, 0);
    }

    #[test]
    fn candidate_links_to_the_tip() {
        let chain = Chain::new(DIFFICULTY);
        let candidate = chain.candidate(vec![tx(1)], "TSE-SP", None);
        assert_eq!(candidate.index, 1);
        assert_eq!(candidate.previous_hash, chain.last().hash);
        assert_eq!(candidate.nonce, 0);
    }

    #[test]
    fn append_extends_and_replace_swaps() {
        let mut chain = Chain::new(DIFFICULTY);
        let block = mined_child(&chain, vec![tx(1)]);
        chain.append(block);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.total_transactions(), 1);

        let longer = {
            let mut other = Chain::new(DIFFICULTY);
            other.append(mined_child(&other, vec![tx(2)]));
            other.append(mined_child(&other, vec![tx(3)]));
            other.snapshot()
        };
        chain.replace(longer);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.total_transactions(), 2);
    }
}
