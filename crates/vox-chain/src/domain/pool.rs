//! Pending-transaction pool.
//!
//! Two structures with different lifetimes: the FIFO pending list (cleared
//! when blocks commit or the chain is replaced) and the processed-id set,
//! which remembers every transaction ever included in any block for the
//! lifetime of the process. The processed set, not pending membership, is
//! the long-term replay defense.

use std::collections::HashSet;

use vox_types::{Block, Transaction};

/// FIFO pool of transactions awaiting inclusion, with at-most-once
/// admission and a persistent processed-transaction memory.
#[derive(Debug)]
pub struct TransactionPool {
    /// Pending transactions in admission order.
    pending: Vec<Transaction>,
    /// Ids of pending transactions, for O(1) duplicate checks.
    pending_ids: HashSet<String>,
    /// Ids of every transaction ever committed to a block.
    processed_ids: HashSet<String>,
    /// How many transactions a single block may carry.
    block_limit: usize,
}

impl TransactionPool {
    pub fn new(block_limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            pending_ids: HashSet::new(),
            processed_ids: HashSet::new(),
            block_limit,
        }
    }

    /// Admit a transaction.
    ///
    /// Returns `false` (a silent no-op, not an error) when the id is empty,
    /// already pending, or already processed.
    pub fn add(&mut self, tx: Transaction) -> bool {
        if tx.id.is_empty() || self.contains(&tx.id) {
            return false;
        }
        self.pending_ids.insert(tx.id.clone());
        self.pending.push(tx);
        true
    }

    /// Is this id pending or already processed?
    pub fn contains(&self, id: &str) -> bool {
        self.pending_ids.contains(id) || self.processed_ids.contains(id)
    }

    /// The first `block_limit` pending transactions in admission order,
    /// without removing them.
    ///
    /// Selection is separate from commitment: a candidate block that loses
    /// the mining race is discarded without losing its transactions.
    pub fn select_for_block(&self) -> Vec<Transaction> {
        self.pending
            .iter()
            .take(self.block_limit)
            .cloned()
            .collect()
    }

    /// Move transactions from pending to processed.
    ///
    /// Called only after the containing block is durably appended.
    pub fn mark_processed(&mut self, transactions: &[Transaction]) {
        for tx in transactions {
            if tx.id.is_empty() {
                continue;
            }
            if self.pending_ids.remove(&tx.id) {
                self.pending.retain(|p| p.id != tx.id);
            }
            self.processed_ids.insert(tx.id.clone());
        }
    }

    /// Drop all pending transactions. The processed set is untouched.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
        self.pending_ids.clear();
    }

    /// Resynchronize the processed set to exactly the transactions present
    /// in `blocks`.
    ///
    /// Used after a chain replacement, where transactions that were pending
    /// locally may have arrived pre-mined inside the adopted chain.
    pub fn rebuild_processed_from_chain(&mut self, blocks: &[Block]) {
        self.processed_ids.clear();
        for block in blocks {
            for tx in &block.transactions {
                if !tx.id.is_empty() {
                    self.processed_ids.insert(tx.id.clone());
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn block_limit(&self) -> usize {
        self.block_limit
    }

    /// Snapshot of everything pending, in admission order.
    pub fn pending(&self) -> Vec<Transaction> {
        self.pending.clone()
    }
}
