//! Length-prefixed text frame codec
//!
//! Frame format:
//! ```text
//! +----------------+------------------+
//! | length         | payload          |
//! | (4 bytes, BE)  | (UTF-8, variable)|
//! +----------------+------------------+
//! ```
//!
//! The codec reassembles frames that span multiple underlying reads, so
//! nothing above it ever sees a truncated or concatenated message. Payload
//! size is bounded to keep a single peer from forcing unbounded buffering.

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Frame header size: 4-byte big-endian payload length
pub const FRAME_HEADER_SIZE: usize = 4;

/// Default maximum frame payload size (64 KiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Codec translating between a raw byte stream and whole text frames
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec with the default maximum frame size
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Create a codec with a specific maximum frame size.
    ///
    /// Payload lengths travel in a u32 prefix, so limits beyond
    /// `u32::MAX` are capped there.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.min(u32::MAX as usize),
        }
    }

    /// The configured maximum payload size
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        if src.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        // Peek at the length prefix without consuming it
        let mut header = [0u8; FRAME_HEADER_SIZE];
        header.copy_from_slice(&src[..FRAME_HEADER_SIZE]);
        let payload_len = u32::from_be_bytes(header) as usize;

        if payload_len > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "frame payload too large: {} bytes (max: {})",
                    payload_len, self.max_frame_size
                ),
            ));
        }

        let total = FRAME_HEADER_SIZE + payload_len;
        if src.len() < total {
            // Partial frame: reserve what the rest will need and wait
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_SIZE);
        let payload = src.split_to(payload_len);

        String::from_utf8(payload.to_vec())
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl<T: AsRef<str>> Encoder<T> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> io::Result<()> {
        let payload = item.as_ref().as_bytes();
        if payload.len() > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "refusing to send frame of {} bytes (max: {})",
                    payload.len(),
                    self.max_frame_size
                ),
            ));
        }

        dst.reserve(FRAME_HEADER_SIZE + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.put_slice(payload);
        Ok(())
    }
}
