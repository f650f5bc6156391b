//! Line-based codec for control channel communication.
//!
//! Commands are terminated with a line feed (`\n`); a preceding carriage
//! return is tolerated and stripped along with surrounding whitespace.
//! Responses are written back terminated with `\r\n`.

use bytes::BytesMut;

use crate::error::{CliError, CliResult};

/// Maximum command line length.
///
/// A `$SM` line carrying a full 32-entry path program stays well below this.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Line terminator appended to every response.
pub const RESPONSE_TERMINATOR: &str = "\r\n";

/// A codec for reading command lines and writing response lines.
///
/// This handles the line-based nature of the control protocol:
/// - Accumulates received bytes until a complete line is found
/// - Trims whitespace and skips blank lines
/// - Drops a line that grows beyond [`MAX_LINE_LENGTH`], up to and
///   including its terminating `\n`
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
    /// Set after an overflow until the next `\n` arrives.
    discarding: bool,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH),
            discarding: false,
        }
    }

    /// Add received data to the buffer.
    ///
    /// A line longer than [`MAX_LINE_LENGTH`] is dropped and an overflow
    /// error is returned. The rest of that line is skipped, even when it
    /// arrives in later pushes, until its `\n` is seen. Complete lines before
    /// and after it are kept.
    pub fn push(&mut self, data: &[u8]) -> CliResult<()> {
        let mut overflow = None;

        for chunk in data.split_inclusive(|&b| b == b'\n') {
            let terminated = chunk.last() == Some(&b'\n');
            if self.discarding {
                self.discarding = !terminated;
                continue;
            }

            let pending_start = self
                .buffer
                .iter()
                .rposition(|&b| b == b'\n')
                .map_or(0, |i| i + 1);
            let pending =
                self.buffer.len() - pending_start + chunk.len() - usize::from(terminated);

            if pending > MAX_LINE_LENGTH {
                self.buffer.truncate(pending_start);
                self.discarding = !terminated;
                log::warn!("control line exceeded {} bytes, dropped", MAX_LINE_LENGTH);
                overflow = Some(pending);
                continue;
            }

            self.buffer.extend_from_slice(chunk);
        }

        match overflow {
            Some(actual) => Err(CliError::BufferOverflow {
                max: MAX_LINE_LENGTH,
                actual,
            }),
            None => Ok(()),
        }
    }

    /// Try to decode a complete line from the buffer.
    ///
    /// Returns `Some(line)` with surrounding whitespace removed, or `None` if
    /// more data is needed. Blank lines are skipped.
    pub fn decode_line(&mut self) -> Option<String> {
        loop {
            let end = self.buffer.iter().position(|&b| b == b'\n')?;

            let line_data = self.buffer.split_to(end + 1);
            let line = String::from_utf8_lossy(&line_data[..end]).trim().to_string();

            if !line.is_empty() {
                return Some(line);
            }
        }
    }

    /// Encode a response line for transmission.
    ///
    /// Appends the `\r\n` terminator.
    pub fn encode_line(line: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(line.len() + RESPONSE_TERMINATOR.len());
        buf.extend_from_slice(line.as_bytes());
        buf.extend_from_slice(RESPONSE_TERMINATOR.as_bytes());
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }
}
