//! Mining driver.
//!
//! Turns pooled transactions into committed blocks: build a candidate from
//! the ledger, brute-force the nonce on a blocking thread, then offer the
//! mined block back for commitment. The proof-of-work search is never
//! interrupted; a candidate that lost the race to another block at the same
//! index is simply discarded at commit time, and its transactions stay
//! pending for the next attempt.
//!
//! Scheduled attempts respect a cooldown between runs; the manual
//! `mine_now` path bypasses it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use vox_chain::ValidationError;
use vox_types::Block;

use crate::config::MiningSettings;
use crate::ledger::{CommitOutcome, Ledger};

/// Result of one mining attempt.
#[derive(Debug)]
pub enum MineOutcome {
    /// The block was mined and committed.
    Committed(Box<Block>),
    /// Mined, but the chain moved past the candidate's index first. The
    /// transactions stay pending.
    Superseded { chain_len: u64 },
    /// Mined, but rejected by validation at commit time.
    Invalid(ValidationError),
    /// Nothing pending; no candidate was built.
    NoPending,
    /// The blocking proof-of-work task did not complete, so there was no
    /// block to offer. The transactions stay pending.
    Aborted,
    /// Scheduled attempt arrived inside the cooldown window.
    CoolingDown { remaining_ms: u64 },
    /// Another attempt is already running.
    Busy,
}

/// One node's miner. Cheap to share; all state lives behind the ledger
/// lock, the attempt flag, and the cooldown stamp.
pub struct Miner {
    ledger: Arc<Ledger>,
    node_id: String,
    cooldown: Duration,
    poll_interval: Duration,
    last_attempt: Mutex<Option<Instant>>,
    mining: AtomicBool,
}

impl Miner {
    pub fn new(ledger: Arc<Ledger>, node_id: impl Into<String>, settings: &MiningSettings) -> Self {
        Self {
            ledger,
            node_id: node_id.into(),
            cooldown: Duration::from_millis(settings.cooldown_ms),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            last_attempt: Mutex::new(None),
            mining: AtomicBool::new(false),
        }
    }

    /// One mining attempt. At most one runs at a time; a second caller gets
    /// [`MineOutcome::Busy`] immediately.
    pub async fn mine_once(&self, respect_cooldown: bool) -> MineOutcome {
        if self.mining.swap(true, Ordering::AcqRel) {
            return MineOutcome::Busy;
        }
        let outcome = self.attempt(respect_cooldown).await;
        self.mining.store(false, Ordering::Release);
        outcome
    }

    async fn attempt(&self, respect_cooldown: bool) -> MineOutcome {
        if respect_cooldown {
            if let Some(last) = *self.last_attempt.lock() {
                let elapsed = last.elapsed();
                if elapsed < self.cooldown {
                    return MineOutcome::CoolingDown {
                        remaining_ms: (self.cooldown - elapsed).as_millis() as u64,
                    };
                }
            }
        }

        let Some(candidate) = self.ledger.build_candidate(&self.node_id) else {
            return MineOutcome::NoPending;
        };
        *self.last_attempt.lock() = Some(Instant::now());

        let difficulty = self.ledger.difficulty();
        let index = candidate.index;
        let tx_count = candidate.transactions.len();
        debug!(index, tx_count, difficulty, "mining candidate block");

        // The nonce search is CPU-bound and can run for a while at higher
        // difficulties; keep it off the async worker threads.
        let started = Instant::now();
        let Some(block) = run_pow(move || {
            let mut block = candidate;
            block.mine(difficulty);
            block
        })
        .await
        else {
            return MineOutcome::Aborted;
        };

        match self.ledger.commit_block(block.clone()) {
            CommitOutcome::Committed => {
                info!(
                    index,
                    tx_count,
                    nonce = block.nonce,
                    hash = %block.short_hash(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "block mined and committed"
                );
                MineOutcome::Committed(Box::new(block))
            }
            CommitOutcome::Superseded { chain_len } => {
                debug!(index, chain_len, "candidate superseded while mining");
                MineOutcome::Superseded { chain_len }
            }
            CommitOutcome::Invalid(err) => {
                warn!(index, error = %err, "mined block failed validation");
                MineOutcome::Invalid(err)
            }
        }
    }

    /// Scheduled mining loop: poll the pool on an interval until shutdown.
    /// Committed blocks are handed to `commits` for broadcast.
    pub async fn run(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
        commits: mpsc::Sender<Block>,
    ) {
        // First poll after one full interval; `interval`'s immediate
        // zeroth tick would mine at startup, before peers can sync.
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.poll_interval,
            self.poll_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    if let MineOutcome::Committed(block) = self.mine_once(true).await {
                        if commits.send(*block).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        debug!("miner loop stopped");
    }
}

/// Run the nonce search on a blocking thread.
///
/// `None` means the task did not complete (panicked or was cancelled); the
/// candidate is lost but the node keeps running.
async fn run_pow<F>(search: F) -> Option<Block>
where
    F: FnOnce() -> Block + Send + 'static,
{
    match tokio::task::spawn_blocking(search).await {
        Ok(block) => Some(block),
        Err(err) => {
            error!(error = %err, "mining task did not complete");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_chain::ResolutionStrategy;
    use vox_types::{Transaction, TransactionKind};

    fn setup(cooldown_ms: u64) -> (Arc<Ledger>, Miner) {
        let ledger = Arc::new(Ledger::new(1, 5, ResolutionStrategy::LongestChain));
        let settings = MiningSettings {
            cooldown_ms,
            poll_interval_ms: 10,
        };
        let miner = Miner::new(Arc::clone(&ledger), "TSE-SP", &settings);
        (ledger, miner)
    }

    fn tx(n: u64) -> Transaction {
        Transaction::with_timestamp(TransactionKind::Vote, &n, "TSE-SP", n).unwrap()
    }

    #[tokio::test]
    async fn empty_pool_mines_nothing() {
        let (_ledger, miner) = setup(0);
        assert!(matches!(miner.mine_once(false).await, MineOutcome::NoPending));
    }

    #[tokio::test]
    async fn pending_transactions_become_a_committed_block() {
        let (ledger, miner) = setup(0);
        ledger.add_transaction(tx(1));
        ledger.add_transaction(tx(2));

        match miner.mine_once(false).await {
            MineOutcome::Committed(block) => {
                assert_eq!(block.index, 1);
                assert_eq!(block.transactions.len(), 2);
                assert_eq!(block.miner_id, "TSE-SP");
            }
            other => panic!("expected Committed, got {other:?}"),
        }
        assert_eq!(ledger.chain_len(), 2);
        assert_eq!(ledger.pool_len(), 0);
        ledger.validate_chain().unwrap();
    }

    #[tokio::test]
    async fn scheduled_attempts_respect_the_cooldown() {
        let (ledger, miner) = setup(60_000);
        ledger.add_transaction(tx(1));
        assert!(matches!(
            miner.mine_once(true).await,
            MineOutcome::Committed(_)
        ));

        ledger.add_transaction(tx(2));
        assert!(matches!(
            miner.mine_once(true).await,
            MineOutcome::CoolingDown { .. }
        ));

        // The manual path ignores the cooldown.
        assert!(matches!(
            miner.mine_once(false).await,
            MineOutcome::Committed(_)
        ));
        assert_eq!(ledger.chain_len(), 3);
    }

    #[tokio::test]
    async fn failed_pow_task_is_contained_and_yields_no_block() {
        assert!(run_pow(|| panic!("nonce search died")).await.is_none());
    }

    #[tokio::test]
    async fn miner_loop_drains_the_pool_and_reports_commits() {
        let (ledger, miner) = setup(0);
        let miner = Arc::new(miner);
        ledger.add_transaction(tx(1));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (commit_tx, mut commit_rx) = mpsc::channel(4);
        let handle = tokio::spawn(Arc::clone(&miner).run(shutdown_rx, commit_tx));

        let block = tokio::time::timeout(Duration::from_secs(5), commit_rx.recv())
            .await
            .expect("miner loop should commit within the timeout")
            .expect("channel open");
        assert_eq!(block.index, 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(ledger.chain_len(), 2);
    }
}
