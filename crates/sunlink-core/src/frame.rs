//! Frame encoding and decoding for the encrypted wire protocol.
//!
//! One frame is a 4-byte cleartext header followed by an AES-ECB
//! ciphertext body:
//!
//! ```text
//! ┌──────┬──────────┬──────────┬─────────┬──────────────────────────┐
//! │ 0x01 │   0x00   │ len byte │ padding │   ciphertext (len+pad)   │
//! │ tag  │ reserved │  L % 256 │ [1,16]  │   16-byte aligned        │
//! └──────┴──────────┴──────────┴─────────┴──────────────────────────┘
//! ```
//!
//! The plaintext inside the body is `68 68` + `request[2..]` + `0xFF`
//! padding: the cipher step destroys the Modbus transaction id, so the
//! codec caches it from the outgoing request and restores it when the
//! response is decoded.
//!
//! The length byte is a single byte, so request lengths of 256 or more
//! wrap silently. That is a limitation of the wire protocol itself and
//! is carried forward here unchanged; round-trip only holds for
//! payloads up to 255 bytes.

use crate::config::LengthMode;
use crate::error::FrameError;
use crate::{FRAME_HEADER_SIZE, FRAME_MARKER, FRAME_TAG};
use sunlink_crypto::{BLOCK_SIZE, EcbCipher};

/// Parsed cleartext frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw length byte (interpretation depends on [`LengthMode`]).
    pub len_byte: u8,
    /// Padding length in bytes, always in `[1, 16]`.
    pub padding: u8,
}

impl FrameHeader {
    /// Parse and validate a header from the first four buffered bytes.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::BadTag` for an unexpected tag byte and
    /// `FrameError::CorruptHeader` for a length/padding combination
    /// that cannot describe a block-aligned body. Rejecting here bounds
    /// buffering before any ciphertext is accumulated.
    pub fn parse(data: &[u8], mode: LengthMode) -> Result<Self, FrameError> {
        debug_assert!(data.len() >= FRAME_HEADER_SIZE);
        if data[0] != FRAME_TAG {
            return Err(FrameError::BadTag(data[0]));
        }
        let header = Self {
            len_byte: data[2],
            padding: data[3],
        };

        let corrupt = FrameError::CorruptHeader {
            len_byte: header.len_byte,
            padding: header.padding,
        };
        if !(1..=BLOCK_SIZE).contains(&(header.padding as usize)) {
            return Err(corrupt);
        }
        let body_len = header.body_len(mode);
        if body_len == 0 || body_len % BLOCK_SIZE != 0 {
            return Err(corrupt);
        }
        if mode == LengthMode::IncludesPadding && (header.len_byte as usize) < header.padding as usize
        {
            return Err(corrupt);
        }
        Ok(header)
    }

    /// Ciphertext body length in bytes.
    #[must_use]
    pub fn body_len(&self, mode: LengthMode) -> usize {
        match mode {
            LengthMode::ExcludesPadding => self.len_byte as usize + self.padding as usize,
            LengthMode::IncludesPadding => self.len_byte as usize,
        }
    }

    /// Reconstructed payload length in bytes.
    #[must_use]
    pub fn payload_len(&self, mode: LengthMode) -> usize {
        match mode {
            LengthMode::ExcludesPadding => self.len_byte as usize,
            LengthMode::IncludesPadding => self.len_byte as usize - self.padding as usize,
        }
    }

    /// Serialize to the 4-byte wire form.
    #[must_use]
    pub fn to_bytes(self) -> [u8; FRAME_HEADER_SIZE] {
        [FRAME_TAG, 0x00, self.len_byte, self.padding]
    }
}

/// Cached transaction-id prefix of the most recent request.
///
/// Normally two bytes; shorter only for degenerate sub-2-byte requests.
#[derive(Debug, Clone, Copy)]
struct PendingTxn {
    bytes: [u8; 2],
    len: usize,
}

/// Stateful frame encoder/decoder for one connection.
///
/// Exactly one request/response pair is in flight at a time, matching
/// ordinary Modbus TCP client usage, so a single cached transaction id
/// suffices.
#[derive(Debug)]
pub struct FrameCodec {
    mode: LengthMode,
    pending: Option<PendingTxn>,
}

impl FrameCodec {
    /// Create a codec for the given length-byte interpretation.
    #[must_use]
    pub fn new(mode: LengthMode) -> Self {
        Self {
            mode,
            pending: None,
        }
    }

    /// Whether a request transaction id is cached.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the cached transaction id.
    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// Encode an outgoing request into one encrypted frame.
    ///
    /// Caches the request's transaction id, replaces it with the
    /// `68 68` marker, pads with `0xFF` to a block boundary (always at
    /// least one pad byte, even when the request is already aligned),
    /// encrypts, and prepends the cleartext header.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::EmptyRequest` for a zero-length request.
    pub fn encode(&mut self, cipher: &EcbCipher, request: &[u8]) -> Result<Vec<u8>, FrameError> {
        if request.is_empty() {
            return Err(FrameError::EmptyRequest);
        }
        let len = request.len();
        let padding = BLOCK_SIZE - (len % BLOCK_SIZE);

        let txn_len = len.min(2);
        let mut txn = [0u8; 2];
        txn[..txn_len].copy_from_slice(&request[..txn_len]);
        self.pending = Some(PendingTxn {
            bytes: txn,
            len: txn_len,
        });

        let mut body = Vec::with_capacity(len + padding);
        body.extend_from_slice(&FRAME_MARKER);
        body.extend_from_slice(&request[txn_len..]);
        body.resize(len + padding, 0xFF);
        cipher.encrypt_blocks(&mut body)?;

        let len_byte = match self.mode {
            LengthMode::ExcludesPadding => len as u8,
            LengthMode::IncludesPadding => (len + padding) as u8,
        };
        let header = FrameHeader {
            len_byte,
            padding: padding as u8,
        };

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
        frame.extend_from_slice(&header.to_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Decode one complete frame body into a reconstructed response.
    ///
    /// Decrypts, verifies the recovered `68 68` marker, re-prepends the
    /// cached transaction id, and returns the original payload length
    /// of bytes. The cached id is kept until the next request so that
    /// several frames concatenated in one delivery all decode.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::BodyLength` if the body does not match the
    /// header, `FrameError::NoPendingTransaction` if no request was
    /// sent first, and `FrameError::BadMarker` if the plaintext does
    /// not open with the frame marker (wrong key or corrupt data).
    pub fn decode(
        &mut self,
        cipher: &EcbCipher,
        header: FrameHeader,
        body: &[u8],
    ) -> Result<Vec<u8>, FrameError> {
        let expected = header.body_len(self.mode);
        if body.len() != expected {
            return Err(FrameError::BodyLength {
                expected,
                actual: body.len(),
            });
        }
        let txn = self.pending.ok_or(FrameError::NoPendingTransaction)?;

        let mut plain = body.to_vec();
        cipher.decrypt_blocks(&mut plain)?;
        if plain[..2] != FRAME_MARKER {
            return Err(FrameError::BadMarker {
                found: [plain[0], plain[1]],
            });
        }

        let payload_len = header.payload_len(self.mode);
        let txn_len = txn.len.min(payload_len);
        let mut payload = Vec::with_capacity(payload_len);
        payload.extend_from_slice(&txn.bytes[..txn_len]);
        payload.extend_from_slice(&plain[2..2 + (payload_len - txn_len)]);
        Ok(payload)
    }
}
