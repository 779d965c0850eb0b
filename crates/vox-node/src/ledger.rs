//! The mutex-guarded ledger facade.
//!
//! One lock over the chain and the pool together, so every decision that
//! reads one and mutates the other — admit a transaction, commit a mined
//! block, adopt a remote chain — is a single critical section. Proof-of-work
//! itself runs outside the lock; only the commit decision holds it.

use parking_lot::Mutex;
use tracing::warn;

use vox_chain::{
    BlockValidator, Chain, ChainSynchronizer, ConflictKind, ConflictResolver, ForkAnalysis,
    Resolution, ResolutionStrategy, SyncOutcome, TransactionPool, ValidationError,
};
use vox_types::{Block, Transaction};

/// What happened to a mined block offered for commitment.
#[derive(Debug)]
pub enum CommitOutcome {
    /// Appended to the chain; its transactions are now processed.
    Committed,
    /// The chain advanced past the block's index while it was being mined.
    /// The block is discarded; its transactions stay pending.
    Superseded { chain_len: u64 },
    /// The block failed validation against the current tip.
    Invalid(ValidationError),
}

/// What happened to an inbound full-chain response.
#[derive(Debug)]
pub enum RemoteChainVerdict {
    /// Longest-chain replacement: the remote chain was strictly longer and
    /// valid, and is now ours.
    Replaced { old_len: u64, new_len: u64 },
    /// The longest-chain rule did not apply; the conflict resolver decided.
    /// When the resolution adopts the remote chain, the swap has already
    /// happened. `analysis` is present for genuine forks.
    Resolved {
        resolution: Resolution,
        analysis: Option<ForkAnalysis>,
    },
    /// The remote chain failed validation; nothing changed.
    Rejected(ValidationError),
}

impl RemoteChainVerdict {
    /// Did the local chain change?
    pub fn chain_changed(&self) -> bool {
        match self {
            Self::Replaced { .. } => true,
            Self::Resolved { resolution, .. } => resolution.adopts_remote(),
            Self::Rejected(_) => false,
        }
    }
}

struct LedgerState {
    chain: Chain,
    pool: TransactionPool,
}

/// Shared ownership of the chain and pool for the node's tasks.
pub struct Ledger {
    state: Mutex<LedgerState>,
    validator: BlockValidator,
    synchronizer: ChainSynchronizer,
    resolver: ConflictResolver,
}

impl Ledger {
    pub fn new(difficulty: usize, block_tx_limit: usize, strategy: ResolutionStrategy) -> Self {
        let validator = BlockValidator::new(difficulty);
        Self {
            state: Mutex::new(LedgerState {
                chain: Chain::new(difficulty),
                pool: TransactionPool::new(block_tx_limit),
            }),
            validator,
            synchronizer: ChainSynchronizer::new(validator),
            resolver: ConflictResolver::new(validator, strategy),
        }
    }

    /// Admit a transaction into the pool. `false` means it was a duplicate
    /// (pending or already committed) and was silently dropped.
    pub fn add_transaction(&self, tx: Transaction) -> bool {
        self.state.lock().pool.add(tx)
    }

    /// Build an unmined candidate from the pooled transactions, or `None`
    /// when nothing is pending. Selection is non-destructive; the pool is
    /// only drained when the mined block commits.
    pub fn build_candidate(&self, miner_id: &str) -> Option<Block> {
        let state = self.state.lock();
        let transactions = state.pool.select_for_block();
        if transactions.is_empty() {
            return None;
        }
        Some(state.chain.candidate(transactions, miner_id, None))
    }

    /// Offer a mined block for commitment.
    ///
    /// Index check, validation against the current tip, append, and pool
    /// bookkeeping all happen under one lock, so a block mined against a
    /// tip that has since moved is discarded rather than appended. The same
    /// path serves locally mined blocks and inbound `NEW_BLOCK` messages at
    /// the expected index.
    pub fn commit_block(&self, block: Block) -> CommitOutcome {
        let mut state = self.state.lock();

        if block.index != state.chain.len() {
            return CommitOutcome::Superseded {
                chain_len: state.chain.len(),
            };
        }
        if let Err(err) = self.validator.validate_block(&block, state.chain.last()) {
            return CommitOutcome::Invalid(err);
        }

        state.pool.mark_processed(&block.transactions);
        state.chain.append(block);
        CommitOutcome::Committed
    }

    /// Decide what to do with an inbound full-chain response.
    ///
    /// First the baseline longest-chain rule; when that says "not needed"
    /// but the chains differ, the fork-aware resolver arbitrates. Either
    /// way, an adopted chain drops all pending transactions and rebuilds
    /// the processed set from the new blocks, in the same critical section
    /// as the swap.
    pub fn handle_remote_chain(&self, remote: &[Block]) -> RemoteChainVerdict {
        let mut state = self.state.lock();

        match self.synchronizer.synchronize(&mut state.chain, remote) {
            SyncOutcome::Success { old_len, new_len } => {
                Self::rebase_pool(&mut state);
                RemoteChainVerdict::Replaced { old_len, new_len }
            }
            SyncOutcome::Failure(err) => RemoteChainVerdict::Rejected(err),
            SyncOutcome::NotNeeded { .. } => {
                let local = state.chain.snapshot();
                let resolution = self.resolver.resolve(&local, remote);
                let analysis = match &resolution {
                    Resolution::AdoptRemote { kind, .. } | Resolution::KeepLocal { kind, .. }
                        if *kind == ConflictKind::Fork =>
                    {
                        Some(self.resolver.analyze_fork(&local, remote))
                    }
                    _ => None,
                };
                if resolution.adopts_remote() {
                    state.chain.replace(remote.to_vec());
                    Self::rebase_pool(&mut state);
                }
                if let Resolution::LocalInvalid(err) = &resolution {
                    warn!(error = %err, "local chain failed validation during conflict resolution");
                }
                RemoteChainVerdict::Resolved {
                    resolution,
                    analysis,
                }
            }
        }
    }

    fn rebase_pool(state: &mut LedgerState) {
        state.pool.clear_pending();
        let blocks = state.chain.snapshot();
        state.pool.rebuild_processed_from_chain(&blocks);
    }

    pub fn chain_len(&self) -> u64 {
        self.state.lock().chain.len()
    }

    pub fn chain_snapshot(&self) -> Vec<Block> {
        self.state.lock().chain.snapshot()
    }

    pub fn tip_hash(&self) -> String {
        self.state.lock().chain.last().hash.clone()
    }

    pub fn pool_len(&self) -> usize {
        self.state.lock().pool.len()
    }

    pub fn total_transactions(&self) -> usize {
        self.state.lock().chain.total_transactions()
    }

    pub fn difficulty(&self) -> usize {
        self.validator.difficulty()
    }

    /// Full-chain self check, for diagnostics.
    pub fn validate_chain(&self) -> Result<(), ValidationError> {
        let blocks = self.chain_snapshot();
        self.validator.validate_chain(&blocks)
    }
}
