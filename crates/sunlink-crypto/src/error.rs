//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material had the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// A reserved "no encryption" sentinel was used where a real public
    /// value is required
    #[error("public value is a no-crypto sentinel, not a valid key")]
    SentinelPublicValue,

    /// Encrypt/decrypt input was not a multiple of the AES block size.
    /// This indicates a framing bug in the caller, not a wire condition.
    #[error("buffer of {len} bytes is not block aligned")]
    NotBlockAligned {
        /// Offending buffer length
        len: usize,
    },
}
