//! # Sunlink Crypto
//!
//! Session cryptography for the Sungrow encrypted Modbus link.
//!
//! This crate provides:
//! - Derivation of the per-session AES key (installed private key XOR
//!   device-supplied public value)
//! - Detection of the reserved "no encryption" sentinel values
//! - AES-128 electronic-codebook block encryption and decryption
//!
//! ECB mode is a property of the inverter's wire protocol, not a choice
//! of this crate: each 16-byte block is encrypted independently under
//! the same key, with no IV, chaining, or authentication. Callers that
//! need an integrity signal must validate structure in the decrypted
//! output themselves.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod ecb;
pub mod error;
pub mod key;

pub use ecb::EcbCipher;
pub use error::CryptoError;
pub use key::{PRIVATE_KEY, PrivateKey, PublicValue, SessionKey};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Key and public-value size in bytes (AES-128).
pub const KEY_SIZE: usize = 16;
