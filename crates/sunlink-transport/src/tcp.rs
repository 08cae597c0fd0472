//! Blocking TCP client over `std::net::TcpStream`.

use crate::error::TransportError;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Instant;
use sunlink_core::{HandshakeProgress, LinkConfig, LinkState, SecureLink};

const READ_BUF_SIZE: usize = 4096;

/// Blocking client for one device connection.
///
/// Connecting runs the key-exchange handshake; afterwards
/// [`transact`](Self::transact) exchanges one raw Modbus TCP
/// request for its response, encrypting and decrypting transparently
/// when the device negotiated a key.
#[derive(Debug)]
pub struct BlockingClient {
    stream: TcpStream,
    link: SecureLink,
    read_buf: Vec<u8>,
}

impl BlockingClient {
    /// Connect to the device and perform the handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the handshake fails. A
    /// device without key registers is not a failure; the session
    /// simply stays cleartext.
    pub fn connect<A: ToSocketAddrs>(addr: A, config: LinkConfig) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        let mut client = Self {
            stream,
            link: SecureLink::new(config),
            read_buf: vec![0u8; READ_BUF_SIZE],
        };
        client.handshake()?;
        Ok(client)
    }

    fn handshake(&mut self) -> Result<(), TransportError> {
        let discovery = self.link.begin_handshake()?;
        self.stream.write_all(discovery)?;

        let deadline = Instant::now() + self.link.config().handshake_timeout;
        loop {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()).filter(|d| !d.is_zero()) else {
                self.link.handshake_deadline()?;
                break;
            };
            self.stream.set_read_timeout(Some(remaining))?;

            match self.stream.read(&mut self.read_buf) {
                Ok(0) => {
                    // closed right after replying? the short form may
                    // already be buffered
                    self.link.handshake_deadline()?;
                    break;
                }
                Ok(n) => {
                    if let HandshakeProgress::Complete(state) =
                        self.link.handshake_feed(&self.read_buf[..n])?
                    {
                        tracing::debug!(?state, "handshake complete");
                        break;
                    }
                }
                Err(e) if is_timeout(&e) => {
                    self.link.handshake_deadline()?;
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.stream
            .set_read_timeout(Some(self.link.config().response_timeout))?;
        Ok(())
    }

    /// Send one raw Modbus TCP request and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ResponseTimeout` when no complete
    /// response arrives in time, `TransportError::ConnectionClosed` if
    /// the peer disconnects, or a link error on a corrupt stream. After
    /// any error the connection must be considered dead.
    pub fn transact(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let wire = self.link.before_send(request)?;
        self.stream.write_all(&wire)?;

        let deadline = Instant::now() + self.link.config().response_timeout;
        loop {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()).filter(|d| !d.is_zero()) else {
                return Err(TransportError::ResponseTimeout);
            };
            self.stream.set_read_timeout(Some(remaining))?;

            match self.stream.read(&mut self.read_buf) {
                Ok(0) => return Err(TransportError::ConnectionClosed),
                Ok(n) => {
                    let response = self.link.after_receive(&self.read_buf[..n])?;
                    if !response.is_empty() {
                        return Ok(response);
                    }
                    // partial frame; keep reading
                }
                Err(e) if is_timeout(&e) => return Err(TransportError::ResponseTimeout),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Session state negotiated at connect time.
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.link.state()
    }

    /// Local address of the underlying socket.
    ///
    /// # Errors
    ///
    /// Propagates the socket error.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.stream.local_addr()?)
    }

    /// Shut down the connection. The client is unusable afterwards.
    pub fn close(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
        self.link.reset();
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
