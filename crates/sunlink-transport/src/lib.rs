//! # Sunlink Transport
//!
//! TCP transports that drive the [`sunlink_core`] link layer.
//!
//! This crate provides:
//! - a blocking client over `std::net::TcpStream` for synchronous code
//! - an async client over `tokio::net::TcpStream`
//!
//! Both run the key-exchange handshake at connect time and then expose
//! a single request/response call; encryption is invisible to the
//! caller, whether the device negotiated a key or declined one.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod tcp;
pub mod tcp_async;

pub use error::TransportError;
pub use tcp::BlockingClient;
pub use tcp_async::AsyncClient;
