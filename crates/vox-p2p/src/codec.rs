//! Length-prefixed binary framing.
//!
//! A frame is a 4-byte big-endian length followed by the bincode encoding
//! of one [`Envelope`]. The length guard bounds what a misbehaving peer can
//! make us allocate.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::WireError;
use crate::message::Envelope;

/// Upper bound on a single frame. A full-chain response is the largest
/// legitimate message; 16 MiB leaves generous headroom.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Encode an envelope into a ready-to-write frame.
pub fn encode_frame(envelope: &Envelope) -> Result<Vec<u8>, WireError> {
    let body = bincode::serialize(envelope)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge {
            len: body.len(),
            max: MAX_FRAME_LEN,
        });
    }
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Serialize, write, and flush one envelope.
pub async fn write_frame<W>(writer: &mut W, envelope: &Envelope) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(envelope)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one envelope.
///
/// Returns `Ok(None)` on a clean EOF at a frame boundary (orderly remote
/// close); any other shortfall or oversized length is an error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Envelope>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(bincode::deserialize(&body)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageKind, MessagePayload};

    #[tokio::test]
    async fn frames_round_trip_over_a_duplex_pipe() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        write_frame(&mut a, &Envelope::new("TSE-SP", MessagePayload::Ping))
            .await
            .unwrap();
        write_frame(&mut a, &Envelope::new("TSE-SP", MessagePayload::RequestChain))
            .await
            .unwrap();
        drop(a);

        let first = read_frame(&mut b).await.unwrap().unwrap();
        assert_eq!(first.kind(), MessageKind::Ping);
        let second = read_frame(&mut b).await.unwrap().unwrap();
        assert_eq!(second.kind(), MessageKind::RequestChain);

        // Clean EOF at a frame boundary.
        assert!(read_frame(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_frame_is_an_error_not_eof() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let frame = encode_frame(&Envelope::new("TSE-SP", MessagePayload::Ping)).unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut a, &frame[..frame.len() - 1])
            .await
            .unwrap();
        drop(a);

        assert!(read_frame(&mut b).await.is_err());
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected_before_allocation() {
        let (mut a, mut b) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut a, &u32::MAX.to_be_bytes())
            .await
            .unwrap();
        drop(a);

        match read_frame(&mut b).await {
            Err(WireError::FrameTooLarge { .. }) => {}
            other => panic!("expected FrameTooLarge, got {other:?}"),
        }
    }
}
