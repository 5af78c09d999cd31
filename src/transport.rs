//! Frame codec: `opcode:u8 | length:u32 (BE) | payload:[length]`.
//!
//! Only `OpCode::Binary` carries a meaningful payload for this protocol.
//! Everything else is either rejected (at accept time) or silently dropped
//! (mid-session) rather than tearing down the connection.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum payload size accepted from the wire. Guards against a malicious
/// or buggy peer claiming a multi-gigabyte length prefix.
pub const MAX_FRAME_LEN: u32 = 1 << 20; // 1 MiB

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Binary,
    Other(u8),
}

impl OpCode {
    pub const BINARY: u8 = 0x02;

    pub fn from_byte(b: u8) -> Self {
        if b == Self::BINARY {
            OpCode::Binary
        } else {
            OpCode::Other(b)
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            OpCode::Binary => Self::BINARY,
            OpCode::Other(b) => b,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("connection closed")]
    Closed,
    #[error("frame length {0} exceeds maximum {MAX_FRAME_LEN}")]
    TooLarge(u32),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Frame {
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

/// Read one frame from `reader`. Returns `Err(FrameError::Closed)` on a
/// clean EOF before any bytes of a new frame arrive.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, FrameError> {
    let mut header = [0u8; 5];
    match reader.read_exact(&mut header[..1]).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(FrameError::Closed),
        Err(e) => return Err(e.into()),
    }
    reader.read_exact(&mut header[1..5]).await?;
    let opcode = OpCode::from_byte(header[0]);
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Frame { opcode, payload })
}

/// Write one frame to `writer`.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    opcode: OpCode,
    payload: &[u8],
) -> Result<(), FrameError> {
    let len = payload.len() as u32;
    let mut header = Vec::with_capacity(5 + payload.len());
    header.push(opcode.to_byte());
    header.extend_from_slice(&len.to_be_bytes());
    header.extend_from_slice(payload);
    writer.write_all(&header).await?;
    writer.flush().await?;
    Ok(())
}

/// Encode a binary JSON frame, ready to hand to a per-connection writer task.
pub fn encode_binary(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + payload.len());
    out.push(OpCode::BINARY);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_a_binary_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, OpCode::Binary, b"hello").await.unwrap();
        let mut cursor = Cursor::new(buf);
        let frame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(frame.opcode, OpCode::Binary);
        assert_eq!(frame.payload, b"hello");
    }

    #[tokio::test]
    async fn rejects_oversized_frame() {
        let mut header = Vec::new();
        header.push(OpCode::BINARY);
        header.extend_from_slice(&(MAX_FRAME_LEN + 1).to_be_bytes());
        let mut cursor = Cursor::new(header);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, FrameError::TooLarge(_)));
    }

    #[tokio::test]
    async fn encode_binary_matches_write_frame() {
        let encoded = encode_binary(b"x");
        let mut via_write = Vec::new();
        write_frame(&mut via_write, OpCode::Binary, b"x").await.unwrap();
        assert_eq!(encoded, via_write);
    }
}
