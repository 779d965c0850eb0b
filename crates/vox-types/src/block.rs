//! Blocks and proof-of-work.
//!
//! The hash preimage is a plain string concatenation of the block fields, in
//! the order `index ‖ previous_hash ‖ timestamp ‖ transactions ‖ nonce ‖
//! miner_id`. That order is part of the wire contract: every node in a
//! deployment must reproduce it exactly or hashes will never agree.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::transaction::Transaction;
use crate::time::now_millis;

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Fixed genesis timestamp so independently started nodes share a genesis.
pub const GENESIS_TIMESTAMP_MS: u64 = 1_700_000_000_000;

/// Miner identity recorded on the genesis block.
pub const GENESIS_MINER_ID: &str = "SYSTEM";

/// One record in the replicated chain.
///
/// Mutable only during mining (nonce search); immutable once it meets the
/// proof-of-work target and is appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain, genesis = 0.
    pub index: u64,
    /// Creation time, Unix milliseconds.
    pub timestamp_ms: u64,
    /// Transactions committed by this block, in pool admission order.
    pub transactions: Vec<Transaction>,
    /// Hash of the predecessor block ("0" for genesis).
    pub previous_hash: String,
    /// SHA-256 of the block contents, lowercase hex.
    pub hash: String,
    /// Proof-of-work counter.
    pub nonce: u64,
    /// Identity of the node that mined this block.
    pub miner_id: String,
}

impl Block {
    /// Construct an unmined block: nonce 0, hash already consistent with it.
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        previous_hash: String,
        miner_id: String,
        timestamp_ms: Option<u64>,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp_ms: timestamp_ms.unwrap_or_else(now_millis),
            transactions,
            previous_hash,
            hash: String::new(),
            nonce: 0,
            miner_id,
        };
        block.hash = block.compute_hash();
        block
    }

    /// The genesis block, unmined. Chain construction mines it to the
    /// configured difficulty so even block 0 carries a valid proof-of-work.
    pub fn genesis() -> Self {
        Self::new(
            0,
            Vec::new(),
            GENESIS_PREVIOUS_HASH.to_string(),
            GENESIS_MINER_ID.to_string(),
            Some(GENESIS_TIMESTAMP_MS),
        )
    }

    /// Recompute the content hash. Pure; does not mutate the block.
    pub fn compute_hash(&self) -> String {
        let tx_repr: String = self.transactions.iter().map(|t| t.summary()).collect();
        let preimage = format!(
            "{}{}{}{}{}{}",
            self.index, self.previous_hash, self.timestamp_ms, tx_repr, self.nonce, self.miner_id
        );
        hex::encode(Sha256::digest(preimage.as_bytes()))
    }

    /// Brute-force the nonce until the hash gains `difficulty` leading `'0'`
    /// characters.
    ///
    /// CPU-bound with no upper iteration bound; callers run this on a
    /// blocking thread and handle supersession at commit time, not here.
    pub fn mine(&mut self, difficulty: usize) {
        while !self.meets_difficulty(difficulty) {
            self.nonce += 1;
            self.hash = self.compute_hash();
        }
    }

    /// Does the stored hash satisfy the proof-of-work target?
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.hash.bytes().take(difficulty).filter(|&b| b == b'0').count() == difficulty
    }

    /// Leading `'0'` characters of the stored hash, the per-block work
    /// indicator used by most-work fork resolution.
    pub fn leading_zeros(&self) -> u32 {
        self.hash.bytes().take_while(|&b| b == b'0').count() as u32
    }

    /// Truncated hash for log lines.
    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(12)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Transaction, TransactionKind};

    fn tx(n: u64) -> Transaction {
        Transaction::with_timestamp(TransactionKind::VoterRegistration, &n, "TSE-SP", n).unwrap()
    }

    #[test]
    fn hash_is_consistent_after_construction() {
        let block = Block::new(1, vec![tx(1)], "abc".into(), "TSE-SP".into(), Some(10));
        assert_eq!(block.hash, block.compute_hash());
    }

    #[test]
    fn hash_depends_on_every_field() {
        let base = Block::new(1, vec![tx(1)], "abc".into(), "TSE-SP".into(), Some(10));

        let mut changed = base.clone();
        changed.nonce = 7;
        assert_ne!(base.compute_hash(), changed.compute_hash());

        let other_index = Block::new(2, vec![tx(1)], "abc".into(), "TSE-SP".into(), Some(10));
        assert_ne!(base.hash, other_index.hash);

        let other_txs = Block::new(1, vec![tx(2)], "abc".into(), "TSE-SP".into(), Some(10));
        assert_ne!(base.hash, other_txs.hash);

        let other_miner = Block::new(1, vec![tx(1)], "abc".into(), "TSE-RJ".into(), Some(10));
        assert_ne!(base.hash, other_miner.hash);
    }

    #[test]
    fn mining_finds_the_first_satisfying_nonce() {
        let mut block = Block::new(1, vec![tx(1)], "abc".into(), "TSE-SP".into(), Some(10));
        block.mine(2);
        assert!(block.hash.starts_with("00"));
        assert_eq!(block.hash, block.compute_hash());

        // No smaller nonce may also satisfy the target.
        let mut probe = block.clone();
        for nonce in 0..block.nonce {
            probe.nonce = nonce;
            probe.hash = probe.compute_hash();
            assert!(!probe.meets_difficulty(2), "nonce {nonce} was skipped");
        }
    }

    #[test]
    fn zero_difficulty_accepts_the_initial_nonce() {
        let mut block = Block::new(1, vec![], "abc".into(), "TSE-SP".into(), Some(10));
        block.mine(0);
        assert_eq!(block.nonce, 0);
    }

    #[test]
    fn genesis_shape_is_fixed() {
        let genesis = Block::genesis();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(genesis.timestamp_ms, GENESIS_TIMESTAMP_MS);
        assert!(genesis.transactions.is_empty());
    }

    #[test]
    fn leading_zeros_counts_the_prefix_run() {
        let mut block = Block::new(1, vec![], "abc".into(), "TSE-SP".into(), Some(10));
        block.hash = "000a12".into();
        assert_eq!(block.leading_zeros(), 3);
        block.hash = "a000".into();
        assert_eq!(block.leading_zeros(), 0);
    }
}
