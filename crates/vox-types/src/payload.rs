//! Typed election payloads.
//!
//! Each [`TransactionKind`](crate::TransactionKind) carries one of these
//! structures, serialized to JSON inside the transaction's opaque payload.
//! The chain core never inspects them; they exist so the service layer and
//! tests build well-formed records instead of raw JSON strings.

use serde::{Deserialize, Serialize};

/// A registered voter. Personal identifiers are stored pre-hashed; the
/// ledger never sees a raw CPF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRegistration {
    pub cpf_hash: String,
    pub password_hash: String,
    pub zone: u32,
    pub section: u32,
}

/// An election administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRegistration {
    pub admin_id: String,
    pub cpf_hash: String,
    pub password_hash: String,
    pub access_level: String,
    pub jurisdiction: String,
}

/// A candidate running in one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRegistration {
    pub candidate_id: String,
    pub election_id: String,
    pub number: String,
    pub name: String,
    pub party: String,
    pub office: String,
    pub state: String,
}

/// Creation of a new election; opening and closing reference it by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionRecord {
    pub election_id: String,
    pub name: String,
    pub description: String,
    pub starts_at_ms: u64,
    pub ends_at_ms: u64,
}

/// Lifecycle marker for [`ElectionOpening`](crate::TransactionKind::ElectionOpening)
/// and [`ElectionClosing`](crate::TransactionKind::ElectionClosing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionTransition {
    pub election_id: String,
    pub effective_at_ms: u64,
}

/// An anonymous ballot. The voting token decouples the ballot from the
/// voter's registration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub election_id: String,
    pub voting_token: String,
    pub candidate_number: String,
    pub cast_at_ms: u64,
}
