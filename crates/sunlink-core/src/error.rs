//! Error types for the Sunlink core link layer.

use crate::link::LinkState;
use thiserror::Error;

/// Top-level link-layer error
#[derive(Debug, Error)]
pub enum Error {
    /// Frame encode/decode error
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Handshake error
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Session sequencing error
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// Cryptographic error
    #[error("crypto error: {0}")]
    Crypto(#[from] sunlink_crypto::CryptoError),
}

/// Frame-level errors. All of these are fatal for the connection: the
/// caller should close the transport and reset the link.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Header tag byte was not the fixed `0x01`
    #[error("invalid frame tag: 0x{0:02X}")]
    BadTag(u8),

    /// Header declared a length/padding combination that cannot frame a
    /// valid ciphertext body
    #[error("corrupt frame header: length byte {len_byte}, padding {padding}")]
    CorruptHeader {
        /// Raw length byte
        len_byte: u8,
        /// Raw padding byte
        padding: u8,
    },

    /// Ciphertext body did not match the length the header declared
    #[error("frame body length mismatch: expected {expected}, got {actual}")]
    BodyLength {
        /// Length the header declared
        expected: usize,
        /// Length actually supplied
        actual: usize,
    },

    /// Decrypted plaintext did not start with the `68 68` marker.
    /// With ECB providing no authentication, a wrong key or corrupted
    /// ciphertext decrypts to garbage; the marker is the only sanity
    /// signal available.
    #[error("decrypted frame marker mismatch: {found:02X?}")]
    BadMarker {
        /// First two decrypted bytes
        found: [u8; 2],
    },

    /// A response frame arrived with no request transaction id cached.
    /// Decode cannot reconstruct the response without it.
    #[error("no pending transaction id for response reconstruction")]
    NoPendingTransaction,

    /// Attempted to encode an empty request
    #[error("cannot encode an empty request")]
    EmptyRequest,

    /// Cipher failure (block alignment broken - an internal bug)
    #[error("cipher error: {0}")]
    Crypto(#[from] sunlink_crypto::CryptoError),
}

/// Handshake errors. Any of these means the connection attempt failed;
/// none of them silently downgrades the session to cleartext.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// No response bytes arrived before the deadline
    #[error("no handshake response before the deadline")]
    Timeout,

    /// The response was incomplete when the deadline expired
    #[error("handshake response incomplete: {len} bytes")]
    TooShort {
        /// Bytes buffered when the deadline expired
        len: usize,
    },

    /// The key field could not be extracted from the response
    #[error("malformed handshake response")]
    Malformed,

    /// The device answered the discovery request with a Modbus
    /// exception: it does not implement the key exchange at all
    #[error("peer does not implement the key exchange")]
    Unsupported,
}

/// Session sequencing errors
#[derive(Debug, Error)]
pub enum LinkError {
    /// Operation not valid in the current session state
    #[error("{op} invalid in state {state:?}")]
    InvalidState {
        /// State the link was in
        state: LinkState,
        /// Operation that was attempted
        op: &'static str,
    },
}
