//! The wire envelope.
//!
//! Every node-to-node exchange is one [`Envelope`] carrying a
//! [`MessagePayload`] — a tagged union over the eight protocol message
//! kinds, so each kind's payload is statically typed and decoded once, at
//! the deserialization boundary.

use serde::{Deserialize, Serialize};
use vox_types::{time::now_millis, Block, PeerEntry, Transaction};

/// Discriminant of a payload, for logging and dispatch tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    NewTransaction,
    NewBlock,
    RequestChain,
    ChainResponse,
    Ping,
    Pong,
    ListPeers,
    PeersResponse,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NewTransaction => "NEW_TRANSACTION",
            Self::NewBlock => "NEW_BLOCK",
            Self::RequestChain => "REQUEST_CHAIN",
            Self::ChainResponse => "CHAIN_RESPONSE",
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::ListPeers => "LIST_PEERS",
            Self::PeersResponse => "PEERS_RESPONSE",
        };
        f.write_str(name)
    }
}

/// Payload union: one variant per protocol message kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessagePayload {
    /// "I have a transaction you may not know about."
    NewTransaction(Transaction),
    /// "I mined (or accepted) this block."
    NewBlock(Box<Block>),
    /// "Send me your full chain."
    RequestChain,
    /// Full chain, tip last.
    ChainResponse(Vec<Block>),
    /// Liveness probe.
    Ping,
    /// Liveness answer.
    Pong,
    /// "Send me your peer catalog."
    ListPeers,
    /// Catalog gossip.
    PeersResponse(Vec<PeerEntry>),
}

impl MessagePayload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::NewTransaction(_) => MessageKind::NewTransaction,
            Self::NewBlock(_) => MessageKind::NewBlock,
            Self::RequestChain => MessageKind::RequestChain,
            Self::ChainResponse(_) => MessageKind::ChainResponse,
            Self::Ping => MessageKind::Ping,
            Self::Pong => MessageKind::Pong,
            Self::ListPeers => MessageKind::ListPeers,
            Self::PeersResponse(_) => MessageKind::PeersResponse,
        }
    }
}

/// One framed unit on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Node id of the sender.
    pub sender_id: String,
    /// Send time, Unix milliseconds. Informational only.
    pub timestamp_ms: u64,
    /// The typed payload.
    pub payload: MessagePayload,
}

impl Envelope {
    pub fn new(sender_id: impl Into<String>, payload: MessagePayload) -> Self {
        Self {
            sender_id: sender_id.into(),
            timestamp_ms: now_millis(),
            payload,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }
}
