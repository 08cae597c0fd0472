//! # Sunlink Core
//!
//! Core link layer for the Sungrow encrypted Modbus-TCP protocol.
//!
//! Sungrow inverters wrap standard Modbus PDUs inside a vendor-specific
//! encryption envelope: a one-time key-exchange handshake at connect
//! time, then per-request frames consisting of a 4-byte cleartext
//! header and an AES-128-ECB body. This crate implements that envelope
//! and nothing else - it owns no socket, performs no I/O, and never
//! interprets Modbus function codes or register values.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SecureLink                                │
//! │  (per-connection shim: state machine + byte interception)       │
//! ├───────────────────────┬─────────────────────────────────────────┤
//! │  HandshakeNegotiator  │  Reassembler + FrameCodec               │
//! │  (key exchange)       │  (frame extraction, encrypt/decrypt)    │
//! └───────────────────────┴─────────────────────────────────────────┘
//! ```
//!
//! The surrounding Modbus client calls in at exactly two interception
//! points: [`SecureLink::before_send`] with the bytes about to go on
//! the wire, and [`SecureLink::after_receive`] with the (possibly
//! partial) bytes just read. Everything else - sockets, timeouts,
//! retries, PDU semantics - belongs to the caller.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod link;
pub mod reassembly;

pub use config::{LengthMode, LinkConfig};
pub use error::{Error, FrameError, HandshakeError, LinkError};
pub use frame::{FrameCodec, FrameHeader};
pub use handshake::{DISCOVERY_REQUEST, HandshakeNegotiator, HandshakeOutcome};
pub use link::{HandshakeProgress, LinkState, SecureLink};
pub use reassembly::Reassembler;

/// Cleartext frame header size in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Fixed tag byte opening every cleartext frame header.
pub const FRAME_TAG: u8 = 0x01;

/// Two-byte marker that replaces the Modbus transaction id inside the
/// encrypted plaintext.
pub const FRAME_MARKER: [u8; 2] = [0x68, 0x68];
