//! Wire and connection errors.

use thiserror::Error;

/// Why sending or receiving a frame failed.
///
/// Any of these on a connection is grounds for disconnecting that single
/// peer; none of them affect other peers or chain state.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode/decode error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("frame of {len} bytes exceeds the {max}-byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("peer is disconnected")]
    Disconnected,
}
