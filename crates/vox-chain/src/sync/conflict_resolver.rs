//! Fork detection and resolution.
//!
//! Used when an explicit fork is suspected, instead of the blunt
//! longest-chain replacement. Classifies how two chains relate, finds the
//! divergence point, and — for a real fork — arbitrates with the configured
//! strategy. Both sides of a deployment must run the same strategy for the
//! outcome to be symmetric.

use serde::{Deserialize, Serialize};
use vox_types::Block;

use crate::domain::validation::BlockValidator;
use crate::error::ValidationError;

/// How a local and a remote chain relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Identical tips: nothing to do.
    NoConflict,
    /// Remote is a pure continuation of the local chain.
    RemoteAhead,
    /// Local is a pure continuation of the remote chain.
    LocalAhead,
    /// Shared prefix, diverging suffixes.
    Fork,
}

/// Fork arbitration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// More blocks wins; equal length breaks the tie by the
    /// lexicographically smaller tip hash (deterministic across nodes).
    LongestChain,
    /// Larger accumulated proof-of-work wins.
    MostWork,
    /// Keep whichever chain this node saw first (the local one).
    FirstSeen,
}

/// Verdict of [`ConflictResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Replace the local chain with the remote one.
    AdoptRemote { kind: ConflictKind, reason: String },
    /// Keep the local chain.
    KeepLocal { kind: ConflictKind, reason: String },
    /// The *local* chain failed validation — the node's own state is bad
    /// and no remote-relative decision is meaningful.
    LocalInvalid(ValidationError),
}

impl Resolution {
    pub fn adopts_remote(&self) -> bool {
        matches!(self, Self::AdoptRemote { .. })
    }
}

/// Diagnostic report for a fork: where the chains part ways and how much
/// work each diverging suffix carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkAnalysis {
    /// Index of the last block the two chains share; `None` when even the
    /// genesis differs.
    pub divergence_point: Option<u64>,
    pub local_branch_len: usize,
    pub remote_branch_len: usize,
    pub local_branch_work: u128,
    pub remote_branch_work: u128,
}

/// Accumulated proof-of-work over the non-genesis blocks of `blocks`:
/// Σ 2^(leading zero count).
pub fn accumulated_work(blocks: &[Block]) -> u128 {
    blocks
        .iter()
        .filter(|b| b.index != 0)
        .map(|b| 1u128 << b.leading_zeros().min(127))
        .sum()
}

/// Arbitrates between divergent chains.
#[derive(Debug, Clone, Copy)]
pub struct ConflictResolver {
    validator: BlockValidator,
    strategy: ResolutionStrategy,
}

impl ConflictResolver {
    pub fn new(validator: BlockValidator, strategy: ResolutionStrategy) -> Self {
        Self {
            validator,
            strategy,
        }
    }

    pub fn strategy(&self) -> ResolutionStrategy {
        self.strategy
    }

    /// Full resolution: validate both chains, classify, arbitrate.
    pub fn resolve(&self, local: &[Block], remote: &[Block]) -> Resolution {
        if let Err(err) = self.validator.validate_chain(local) {
            return Resolution::LocalInvalid(err);
        }
        if let Err(err) = self.validator.validate_chain(remote) {
            return Resolution::KeepLocal {
                kind: ConflictKind::NoConflict,
                reason: format!("remote chain invalid: {err}"),
            };
        }

        let kind = classify(local, remote);
        match kind {
            ConflictKind::NoConflict => Resolution::KeepLocal {
                kind,
                reason: "chains are identical".into(),
            },
            ConflictKind::RemoteAhead => Resolution::AdoptRemote {
                kind,
                reason: "remote chain is a continuation of the local one".into(),
            },
            ConflictKind::LocalAhead => Resolution::KeepLocal {
                kind,
                reason: "local chain is ahead".into(),
            },
            ConflictKind::Fork => self.resolve_fork(local, remote),
        }
    }

    fn resolve_fork(&self, local: &[Block], remote: &[Block]) -> Resolution {
        match self.strategy {
            ResolutionStrategy::LongestChain => resolve_by_length(local, remote),
            ResolutionStrategy::MostWork => resolve_by_work(local, remote),
            ResolutionStrategy::FirstSeen => Resolution::KeepLocal {
                kind: ConflictKind::Fork,
                reason: "keeping first-seen (local) chain".into(),
            },
        }
    }

    /// Diagnostic breakdown of the diverging suffixes.
    pub fn analyze_fork(&self, local: &[Block], remote: &[Block]) -> ForkAnalysis {
        let divergence = divergence_point(local, remote);
        let cut = divergence.map(|d| d as usize + 1).unwrap_or(0);
        let local_branch = &local[cut.min(local.len())..];
        let remote_branch = &remote[cut.min(remote.len())..];
        ForkAnalysis {
            divergence_point: divergence,
            local_branch_len: local_branch.len(),
            remote_branch_len: remote_branch.len(),
            local_branch_work: accumulated_work(local_branch),
            remote_branch_work: accumulated_work(remote_branch),
        }
    }
}

/// Classify how `remote` relates to `local`.
pub fn classify(local: &[Block], remote: &[Block]) -> ConflictKind {
    if local.len() == remote.len()
        && local.last().map(|b| &b.hash) == remote.last().map(|b| &b.hash)
    {
        return ConflictKind::NoConflict;
    }

    match divergence_point(local, remote) {
        // Even the genesis differs: the chains are not comparable, treat as
        // a fork and let the strategy decide.
        None => ConflictKind::Fork,
        Some(d) => {
            let d = d as usize;
            if d == local.len() - 1 {
                ConflictKind::RemoteAhead
            } else if d == remote.len() - 1 {
                ConflictKind::LocalAhead
            } else {
                ConflictKind::Fork
            }
        }
    }
}

/// Index of the last block both chains agree on, scanning from genesis.
/// `None` when the chains disagree from block 0.
pub fn divergence_point(local: &[Block], remote: &[Block]) -> Option<u64> {
    let shared = local.len().min(remote.len());
    for i in 0..shared {
        if local[i].hash != remote[i].hash {
            return i.checked_sub(1).map(|d| d as u64);
        }
    }
    shared.checked_sub(1).map(|d| d as u64)
}

fn resolve_by_length(local: &[Block], remote: &[Block]) -> Resolution {
    if remote.len() > local.len() {
        return Resolution::AdoptRemote {
            kind: ConflictKind::Fork,
            reason: format!(
                "remote chain longer ({} vs {} blocks)",
                remote.len(),
                local.len()
            ),
        };
    }

    if remote.len() == local.len() {
        // Deterministic tie-break: both sides compare the same pair of tip
        // hashes, so exactly one of them adopts.
        let local_tip = &local[local.len() - 1].hash;
        let remote_tip = &remote[remote.len() - 1].hash;
        if remote_tip < local_tip {
            return Resolution::AdoptRemote {
                kind: ConflictKind::Fork,
                reason: "equal length, remote tip hash wins tie-break".into(),
            };
        }
    }

    Resolution::KeepLocal {
        kind: ConflictKind::Fork,
        reason: format!(
            "local chain kept ({} >= {} blocks)",
            local.len(),
            remote.len()
        ),
    }
}

fn resolve_by_work(local: &[Block], remote: &[Block]) -> Resolution {
    let local_work = accumulated_work(local);
    let remote_work = accumulated_work(remote);
    if remote_work > local_work {
        Resolution::AdoptRemote {
            kind: ConflictKind::Fork,
            reason: format!("remote chain has more work ({remote_work} vs {local_work})"),
        }
    } else {
        Resolution::KeepLocal {
            kind: ConflictKind::Fork,
            reason: format!("local chain kept (work {local_work} >= {remote_work})"),
        }
    }
}
