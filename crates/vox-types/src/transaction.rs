//! Election transactions.
//!
//! A transaction is an opaque JSON payload plus routing metadata. The `id`
//! is the sole deduplication key across the whole network: the pool, the
//! processed-history set, and peer rebroadcast decisions all compare ids
//! and nothing else.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::time::now_millis;

/// The kinds of records a voting ledger carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    VoterRegistration,
    AdminRegistration,
    CandidateRegistration,
    ElectionCreation,
    ElectionOpening,
    ElectionClosing,
    Vote,
}

impl TransactionKind {
    /// Stable uppercase tag used inside transaction ids.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::VoterRegistration => "VOTER_REGISTRATION",
            Self::AdminRegistration => "ADMIN_REGISTRATION",
            Self::CandidateRegistration => "CANDIDATE_REGISTRATION",
            Self::ElectionCreation => "ELECTION_CREATION",
            Self::ElectionOpening => "ELECTION_OPENING",
            Self::ElectionClosing => "ELECTION_CLOSING",
            Self::Vote => "VOTE",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single ledger entry awaiting (or already granted) inclusion in a block.
///
/// Immutable once constructed; embedded into exactly one mined block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Network-unique id, `{origin}-{KIND}-{timestamp}-{suffix}`.
    pub id: String,
    /// What this record is.
    pub kind: TransactionKind,
    /// Opaque JSON payload; schema determined by `kind`.
    pub payload: String,
    /// Identity of the node or service that created the record.
    pub origin_id: String,
    /// Creation time, Unix milliseconds.
    pub timestamp_ms: u64,
}

impl Transaction {
    /// Build a transaction stamped with the current wall clock.
    ///
    /// The id suffix is random (UUID v4 prefix), so two calls with identical
    /// content still produce distinct transactions.
    pub fn new<T: Serialize>(
        kind: TransactionKind,
        payload: &T,
        origin_id: &str,
    ) -> Result<Self, serde_json::Error> {
        let timestamp_ms = now_millis();
        let suffix = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        Ok(Self {
            id: Self::format_id(origin_id, kind, timestamp_ms, &suffix),
            kind,
            payload: serde_json::to_string(payload)?,
            origin_id: origin_id.to_string(),
            timestamp_ms,
        })
    }

    /// Build a transaction with a caller-supplied timestamp and a
    /// deterministic id suffix.
    ///
    /// Two nodes constructing the same record with the same timestamp derive
    /// the same id, which is what lets the replay defense treat them as one.
    pub fn with_timestamp<T: Serialize>(
        kind: TransactionKind,
        payload: &T,
        origin_id: &str,
        timestamp_ms: u64,
    ) -> Result<Self, serde_json::Error> {
        let digest = Sha256::digest(format!("{origin_id}{}{timestamp_ms}", kind.tag()));
        let suffix = hex::encode(digest)[..8].to_string();
        Ok(Self {
            id: Self::format_id(origin_id, kind, timestamp_ms, &suffix),
            kind,
            payload: serde_json::to_string(payload)?,
            origin_id: origin_id.to_string(),
            timestamp_ms,
        })
    }

    fn format_id(origin: &str, kind: TransactionKind, ts: u64, suffix: &str) -> String {
        format!("{origin}-{}-{ts}-{suffix}", kind.tag())
    }

    /// Decode the payload into its typed form.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }

    /// Stable one-line representation folded into the block-hash preimage.
    ///
    /// Field order is part of the hash contract; do not reorder.
    pub fn summary(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.id,
            self.kind.tag(),
            self.origin_id,
            self.timestamp_ms
        )
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Transaction {}
