//! Newline-delimited codec for device responses
//!
//! Firmware replies are framed as:
//! ```text
//! [ N bytes: text ][ optional '\r' ]['\n']
//! ```
//!
//! Serial reads return arbitrary chunks, so bytes are accumulated until a full
//! line is available.

use bytes::{Buf, BytesMut};
use thiserror::Error;

use crate::protocol::MAX_RESPONSE_LINE;

/// Errors that can occur while decoding response lines
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Response line too long: {0} bytes without a terminator (max: {1})")]
    LineTooLong(usize, usize),
}

/// Try to decode one newline-terminated line from a buffer
///
/// Returns:
/// - `Ok(Some(line))` if a complete line was decoded (terminator stripped)
/// - `Ok(None)` if more data is needed
/// - `Err(...)` if the pending data exceeds `max_len` with no terminator
pub fn decode_line(buf: &mut BytesMut, max_len: usize) -> Result<Option<String>, CodecError> {
    let newline = match buf.iter().position(|b| *b == b'\n') {
        Some(pos) => pos,
        None if buf.len() > max_len => {
            return Err(CodecError::LineTooLong(buf.len(), max_len));
        }
        None => return Ok(None),
    };

    let mut line = buf.split_to(newline);
    buf.advance(1);

    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }

    // Firmware occasionally emits stray non-UTF-8 bytes after a reset
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

/// Streaming decoder for device response lines
#[derive(Debug)]
pub struct LineDecoder {
    /// Partial line data being accumulated
    buffer: BytesMut,
    max_len: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    /// Create a decoder with the default line limit
    pub fn new() -> Self {
        Self::with_max_len(MAX_RESPONSE_LINE)
    }

    /// Create a decoder that rejects lines longer than `max_len`
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            max_len,
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next line from the buffer
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete lines
    pub fn decode_next(&mut self) -> Result<Option<String>, CodecError> {
        decode_line(&mut self.buffer, self.max_len)
    }

    /// Bytes held that do not yet form a full line
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}
