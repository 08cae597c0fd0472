//! TCP stream reassembly for encrypted frames.
//!
//! TCP delivers a byte stream, not frames: one read may contain half a
//! frame, exactly one, or several concatenated. The [`Reassembler`]
//! accumulates raw bytes and yields complete frames in arrival order.

use crate::config::LengthMode;
use crate::error::FrameError;
use crate::frame::FrameHeader;
use crate::FRAME_HEADER_SIZE;

/// Compact the arena once the consumed prefix grows past this.
const COMPACT_THRESHOLD: usize = 4096;

/// Accumulates stream bytes and extracts complete frames in FIFO order.
///
/// Backed by a single `Vec` with a consume cursor; consumed bytes are
/// reclaimed lazily so back-to-back small frames do not shift the
/// buffer on every extraction.
#[derive(Debug, Default)]
pub struct Reassembler {
    buf: Vec<u8>,
    head: usize,
}

impl Reassembler {
    /// Create an empty reassembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffered bytes not yet consumed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len() - self.head
    }

    /// Whether no unconsumed bytes are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head == self.buf.len()
    }

    /// Append bytes read from the transport.
    pub fn extend(&mut self, data: &[u8]) {
        if self.head >= COMPACT_THRESHOLD {
            self.buf.drain(..self.head);
            self.head = 0;
        }
        self.buf.extend_from_slice(data);
    }

    /// Try to extract the next complete frame.
    ///
    /// Returns `Ok(None)` when the buffer holds only a partial frame;
    /// more bytes must be read first. A partial frame is never an
    /// error. On `Ok(Some(..))` the frame's bytes are consumed and the
    /// returned body slice borrows the internal buffer.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] if the buffered header is invalid. The
    /// stream has no resynchronization point, so the caller must close
    /// the connection on error.
    pub fn next_frame(&mut self, mode: LengthMode) -> Result<Option<(FrameHeader, &[u8])>, FrameError> {
        let pending = &self.buf[self.head..];
        if pending.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }
        let header = FrameHeader::parse(&pending[..FRAME_HEADER_SIZE], mode)?;
        let frame_len = FRAME_HEADER_SIZE + header.body_len(mode);
        if pending.len() < frame_len {
            return Ok(None);
        }

        let body_start = self.head + FRAME_HEADER_SIZE;
        let body_end = self.head + frame_len;
        self.head = body_end;
        Ok(Some((header, &self.buf[body_start..body_end])))
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.head = 0;
    }
}
