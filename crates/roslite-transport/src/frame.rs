//! Stream framing for multipart messages.
//!
//! ```text
//! u32 part count | u32 len | bytes | u32 len | bytes | ...
//! ```
//!
//! All integers are big-endian.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransportError;
use crate::message::Message;

/// Maximum number of frames in one message.
pub const MAX_PARTS: usize = 64;

/// Maximum size of a single frame (64 MiB).
pub const MAX_PART_SIZE: usize = 64 * 1024 * 1024;

/// Writes one message. Does not flush.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if message.is_empty() || message.len() > MAX_PARTS {
        return Err(TransportError::InvalidFrame(format!(
            "message has {} parts (expected 1..={MAX_PARTS})",
            message.len()
        )));
    }

    writer.write_u32(message.len() as u32).await?;
    for part in message.parts() {
        if part.len() > MAX_PART_SIZE {
            return Err(TransportError::InvalidFrame(format!(
                "part too large: {} bytes",
                part.len()
            )));
        }
        writer.write_u32(part.len() as u32).await?;
        writer.write_all(part).await?;
    }
    Ok(())
}

/// Reads one message.
///
/// A clean end of stream before the first byte of a message is reported
/// as `TransportError::Closed`.
pub async fn read_message<R>(reader: &mut R) -> Result<Message, TransportError>
where
    R: AsyncRead + Unpin,
{
    let count = reader.read_u32().await.map_err(eof_as_closed)? as usize;
    if count == 0 || count > MAX_PARTS {
        return Err(TransportError::InvalidFrame(format!(
            "message has {count} parts (expected 1..={MAX_PARTS})"
        )));
    }

    let mut parts = Vec::with_capacity(count);
    for _ in 0..count {
        let len = reader.read_u32().await.map_err(eof_as_closed)? as usize;
        if len > MAX_PART_SIZE {
            return Err(TransportError::InvalidFrame(format!(
                "part too large: {len} bytes"
            )));
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await.map_err(eof_as_closed)?;
        parts.push(Bytes::from(buf));
    }

    Ok(Message::new(parts))
}

fn eof_as_closed(e: std::io::Error) -> TransportError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        TransportError::Closed
    } else {
        e.into()
    }
}
