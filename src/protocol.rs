//! Length-prefixed frame codec for the engine wire protocol
//!
//! One frame is one complete logical message:
//!
//! ```text
//! ┌────────────────────┬──────────────────────┐
//! │  Length (4 bytes)  │  Payload (N bytes)   │
//! │   u32 big-endian   │   opaque binary      │
//! └────────────────────┴──────────────────────┘
//! ```
//!
//! The payload is an opaque blob to this module; callers layer their own
//! text/JSON conventions on top. Exactly one request is in flight per socket,
//! so there is no message-id correlation here.

use crate::error::{GlanceError, Result};
use std::io::{self, Read, Write};

/// Maximum frame size (64 MiB). A larger declared length means the stream has
/// desynchronized, not that a real payload is coming.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// Write one frame: 4-byte big-endian length header, then the payload.
///
/// Header and payload are assembled into a single buffer and written with one
/// `write_all`, so the header always precedes the payload on the wire.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_FRAME_SIZE as usize {
        return Err(GlanceError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes", payload.len()),
        )));
    }

    let mut buffer = Vec::with_capacity(4 + payload.len());
    buffer.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buffer.extend_from_slice(payload);

    writer.write_all(&buffer)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame, accumulating stream chunks until `4 + length` bytes arrive.
///
/// `read_exact` loops over however many partial reads the stream delivers, so
/// a frame split into 1-byte chunks reassembles correctly. There is no
/// timeout: a peer that never completes the frame blocks the caller (see the
/// bridge layer for opt-in bounded waits).
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    read_or_incomplete(reader, &mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes);

    if len > MAX_FRAME_SIZE {
        // Desynchronized stream; the declared length cannot be trusted.
        return Err(GlanceError::IncompleteFrame);
    }

    let mut payload = vec![0u8; len as usize];
    read_or_incomplete(reader, &mut payload)?;
    Ok(payload)
}

fn read_or_incomplete<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => GlanceError::IncompleteFrame,
        _ => GlanceError::Io(e),
    })
}
