//! Transport error type.

use thiserror::Error;

/// Errors from the blocking and async TCP clients.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket-level I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Link-layer failure (handshake, framing or sequencing)
    #[error(transparent)]
    Link(#[from] sunlink_core::Error),

    /// No complete response arrived within the response timeout
    #[error("response timed out")]
    ResponseTimeout,

    /// The peer closed the connection mid-exchange
    #[error("connection closed by peer")]
    ConnectionClosed,
}
