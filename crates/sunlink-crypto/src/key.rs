//! Key material and session-key derivation.
//!
//! All Sungrow clients of this protocol revision ship the same installed
//! private key. During the handshake the device returns a 16-byte public
//! value; the session key is the byte-wise XOR of the two. Two reserved
//! public values (all-zero and all-0xFF) mean "do not encrypt this
//! session" and are never valid keys.

use crate::{CryptoError, KEY_SIZE};
use subtle::ConstantTimeEq;
use zeroize::ZeroizeOnDrop;

/// Installed private key shared by every client of this protocol revision.
pub const PRIVATE_KEY: PrivateKey = PrivateKey(*b"Grow#0*2Sun68CbE");

/// Reserved public value meaning "no encryption" (all zero).
pub const NO_CRYPTO_ZEROS: [u8; KEY_SIZE] = [0x00; KEY_SIZE];

/// Reserved public value meaning "no encryption" (all 0xFF).
pub const NO_CRYPTO_ONES: [u8; KEY_SIZE] = [0xFF; KEY_SIZE];

/// Installed 16-byte private key. Immutable for the life of the process.
#[derive(Clone, Copy)]
pub struct PrivateKey([u8; KEY_SIZE]);

impl PrivateKey {
    /// Create a private key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Per-session public value returned by the device during the handshake.
///
/// Lives for one connection and is discarded on disconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicValue([u8; KEY_SIZE]);

impl PublicValue {
    /// Create a public value from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyLength` if the slice is not
    /// exactly 16 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        if slice.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Check whether this is one of the reserved "no encryption"
    /// sentinels (constant time).
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        let zeros = self.0.ct_eq(&NO_CRYPTO_ZEROS);
        let ones = self.0.ct_eq(&NO_CRYPTO_ONES);
        bool::from(zeros | ones)
    }

    /// Get raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Derived 16-byte session key. Zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    /// Create a session key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Derive the session key as the byte-wise XOR of the installed
    /// private key and the device's public value.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SentinelPublicValue` if the public value is
    /// one of the reserved "no encryption" sentinels.
    pub fn derive(private: &PrivateKey, public: &PublicValue) -> Result<Self, CryptoError> {
        if public.is_sentinel() {
            return Err(CryptoError::SentinelPublicValue);
        }

        let mut key = [0u8; KEY_SIZE];
        for (out, (a, b)) in key
            .iter_mut()
            .zip(private.as_bytes().iter().zip(public.as_bytes().iter()))
        {
            *out = a ^ b;
        }
        Ok(Self(key))
    }

    /// Get raw key bytes.
    ///
    /// # Security
    ///
    /// Handle with care - this exposes the raw key material.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}
