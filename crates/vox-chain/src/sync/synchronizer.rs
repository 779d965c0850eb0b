//! Baseline longest-chain synchronization.
//!
//! Applied to every inbound full-chain response: an invalid remote chain is
//! rejected outright, a remote chain no longer than ours is ignored, and a
//! strictly longer valid one replaces the local chain atomically. The
//! richer fork classification lives in
//! [`conflict_resolver`](crate::sync::conflict_resolver).

use vox_types::Block;

use crate::domain::chain::Chain;
use crate::domain::validation::BlockValidator;
use crate::error::ValidationError;

/// What `synchronize` decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The remote chain replaced the local one.
    Success { old_len: u64, new_len: u64 },
    /// The remote chain is not longer than ours; nothing changed.
    NotNeeded { local_len: u64, remote_len: u64 },
    /// The remote chain failed validation; nothing changed.
    Failure(ValidationError),
}

impl SyncOutcome {
    pub fn replaced(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Arbiter for inbound full-chain responses.
#[derive(Debug, Clone, Copy)]
pub struct ChainSynchronizer {
    validator: BlockValidator,
}

impl ChainSynchronizer {
    pub fn new(validator: BlockValidator) -> Self {
        Self { validator }
    }

    /// Apply the longest-chain rule to `remote`, replacing `chain` when the
    /// remote wins. Either the whole chain is swapped or nothing changes.
    pub fn synchronize(&self, chain: &mut Chain, remote: &[Block]) -> SyncOutcome {
        if let Err(err) = self.validator.validate_chain(remote) {
            return SyncOutcome::Failure(err);
        }

        let local_len = chain.len();
        let remote_len = remote.len() as u64;

        if remote_len <= local_len {
            return SyncOutcome::NotNeeded {
                local_len,
                remote_len,
            };
        }

        chain.replace(remote.to_vec());
        SyncOutcome::Success {
            old_len: local_len,
            new_len: remote_len,
        }
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

    fn grow(chain: &mut Chain, seed: u64) {
        let mut block = chain.candidate(vec![tx(seed)], "TSE-SP", Some(1_700_000_000_000 + seed));
        block.mine(DIFFICULTY);
        chain.append(block);
    }

    fn synchronizer() -> ChainSynchronizer {
        ChainSynchronizer::new(BlockValidator::new(DIFFICULTY))
    }

    #[test]
    fn longer_valid_remote_replaces_local() {
        let mut local = Chain::new(DIFFICULTY);
        let mut remote = Chain::new(DIFFICULTY);
        grow(&mut remote, 1);
        grow(&mut remote, 2);

        let outcome = synchronizer().synchronize(&mut local, &remote.snapshot());
        assert_eq!(
            outcome,
            SyncOutcome::Success {
                old_len: 1,
                new_len: 3
            }
        );
        assert_eq!(local.len(), 3);
        assert_eq!(local.last().hash, remote.last().hash);
    }

    #[test]
    fn equal_or_shorter_remote_is_not_needed() {
        let mut local = Chain::new(DIFFICULTY);
        grow(&mut local, 1);
        let remote = Chain::new(DIFFICULTY);

        let outcome = synchronizer().synchronize(&mut local, &remote.snapshot());
        assert_eq!(
            outcome,
            SyncOutcome::NotNeeded {
                local_len: 2,
                remote_len: 1
            }
        );
        assert_eq!(local.len(), 2);

        // Equal length is also not needed.
        let same = local.snapshot();
        assert!(matches!(
            synchronizer().synchronize(&mut local, &same),
            SyncOutcome::NotNeeded { .. }
        ));
    }

    #[test]
    fn invalid_remote_fails_without_touching_local() {
        let mut local = Chain::new(DIFFICULTY);
        let mut remote = Chain::new(DIFFICULTY);
        grow(&mut remote, 1);
        grow(&mut remote, 2);
        let mut blocks = remote.snapshot();
        blocks[1].transactions.clear(); // break the content hash

        let before = local.last().hash.clone();
        let outcome = synchronizer().synchronize(&mut local, &blocks);
        assert!(matches!(outcome, SyncOutcome::Failure(_)));
        assert_eq!(local.len(), 1);
        assert_eq!(local.last().hash, before);
    }

    #[test]
    fn empty_remote_fails() {
        let mut local = Chain::new(DIFFICULTY);
        assert_eq!(
            synchronizer().synchronize(&mut local, &[]),
            SyncOutcome::Failure(ValidationError::EmptyChain)
        );
    }
}
