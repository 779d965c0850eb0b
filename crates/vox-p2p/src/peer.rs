//! A live peer connection.
//!
//! One [`Peer`] per established TCP connection, inbound or outbound. The
//! peer owns the write half behind an async mutex (sends are serialized per
//! connection) and hands the read half back as a [`PeerReader`] for the
//! node's per-connection read loop. A failed send or a closed read marks
//! the peer disconnected; the node then drops it from the active set.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::codec::{read_frame, write_frame};
use crate::error::WireError;
use crate::message::Envelope;

/// The sending side and identity of one connection.
pub struct Peer {
    id: String,
    connected: AtomicBool,
    writer: Mutex<OwnedWriteHalf>,
}

impl Peer {
    /// Split a connected stream into a shareable peer handle and its reader.
    pub fn from_stream(id: impl Into<String>, stream: TcpStream) -> (Self, PeerReader) {
        let (read_half, write_half) = stream.into_split();
        let peer = Self {
            id: id.into(),
            connected: AtomicBool::new(true),
            writer: Mutex::new(write_half),
        };
        (peer, PeerReader::new(read_half))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Mark the connection dead. Idempotent; the underlying socket closes
    /// when both halves are dropped.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Serialize, write, and flush one envelope to this peer.
    ///
    /// Any failure permanently marks the peer disconnected — there is no
    /// per-message retry at this layer.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), WireError> {
        if !self.is_connected() {
            return Err(WireError::Disconnected);
        }
        let mut writer = self.writer.lock().await;
        match write_frame(&mut *writer, envelope).await {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!(peer = %self.id, error = %err, "send failed, disconnecting peer");
                self.disconnect();
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// The receiving side of a connection: yields one decoded envelope at a
/// time until the peer closes or the stream errors.
pub struct PeerReader {
    reader: BufReader<OwnedReadHalf>,
}

impl PeerReader {
    fn new(read_half: OwnedReadHalf) -> Self {
        Self {
            reader: BufReader::new(read_half),
        }
    }

    /// Next inbound envelope; `Ok(None)` on orderly remote close.
    pub async fn next(&mut self) -> Result<Option<Envelope>, WireError> {
        read_frame(&mut self.reader).await
    }
}
