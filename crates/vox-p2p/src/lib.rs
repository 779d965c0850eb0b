//! # Peer-to-Peer Protocol
//!
//! Everything two VoxChain nodes need to talk to each other:
//!
//! - [`message`]: the wire envelope and the tagged payload union over the
//!   eight message kinds.
//! - [`codec`]: length-prefixed binary framing on top of any async stream.
//! - [`peer`]: one live bidirectional connection — a locked framed writer
//!   plus a reader yielding decoded envelopes.
//! - [`discovery`]: the peer catalog (address book) that the node's
//!   periodic discovery tasks maintain and gossip.
//!
//! This crate owns no chain state and makes no consensus decisions; it
//! moves envelopes and tracks addresses. Dispatch lives in `vox-node`.

pub mod codec;
pub mod discovery;
pub mod error;
pub mod message;
pub mod peer;

pub use discovery::PeerCatalog;
pub use error::WireError;
pub use message::{Envelope, MessageKind, MessagePayload};
pub use peer::{Peer, PeerReader};
