//! Length-prefixed packet framing over any async byte stream
//!
//! Each frame is a 4-byte big-endian length followed by a bincode-encoded
//! [`Packet`]. Reading a frame and decoding it are separate steps so that a
//! receiver can drop a malformed payload and keep the connection open.

use crate::error::ProtocolError;
use crate::protocol::Packet;
use bincode::{deserialize, serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame. Reconnect history dumps are the biggest payloads.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

pub fn encode(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let payload = serialize(packet)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }
    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

pub fn decode(payload: &[u8]) -> Result<Packet, ProtocolError> {
    Ok(deserialize(payload)?)
}

/// Reads one frame payload. A clean end of stream yields `ProtocolError::Closed`.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::Closed)
        }
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(packet)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
