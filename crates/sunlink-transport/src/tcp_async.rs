//! Async TCP client over `tokio::net::TcpStream`.

use crate::error::TransportError;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::{Instant, timeout_at};
use sunlink_core::{HandshakeProgress, LinkConfig, LinkState, SecureLink};

const READ_BUF_SIZE: usize = 4096;

/// Async client for one device connection.
///
/// The async twin of [`BlockingClient`](crate::BlockingClient): same
/// handshake at connect time, same transparent encryption, driven by
/// tokio instead of socket read timeouts.
#[derive(Debug)]
pub struct AsyncClient {
    stream: TcpStream,
    link: SecureLink,
    read_buf: Vec<u8>,
}

impl AsyncClient {
    /// Connect to the device and perform the handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the handshake fails. A
    /// device without key registers is not a failure; the session
    /// simply stays cleartext.
    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
        config: LinkConfig,
    ) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let mut client = Self {
            stream,
            link: SecureLink::new(config),
            read_buf: vec![0u8; READ_BUF_SIZE],
        };
        client.handshake().await?;
        Ok(client)
    }

    async fn handshake(&mut self) -> Result<(), TransportError> {
        let discovery = self.link.begin_handshake()?;
        self.stream.write_all(discovery).await?;

        let deadline = Instant::now() + self.link.config().handshake_timeout;
        loop {
            let read = timeout_at(deadline, self.stream.read(&mut self.read_buf)).await;
            match read {
                Err(_elapsed) => {
                    self.link.handshake_deadline()?;
                    return Ok(());
                }
                Ok(Ok(0)) => {
                    self.link.handshake_deadline()?;
                    return Ok(());
                }
                Ok(Ok(n)) => {
                    if let HandshakeProgress::Complete(state) =
                        self.link.handshake_feed(&self.read_buf[..n])?
                    {
                        tracing::debug!(?state, "handshake complete");
                        return Ok(());
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Send one raw Modbus TCP request and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ResponseTimeout` when no complete
    /// response arrives in time, `TransportError::ConnectionClosed` if
    /// the peer disconnects, or a link error on a corrupt stream. After
    /// any error the connection must be considered dead.
    pub async fn transact(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let wire = self.link.before_send(request)?;
        self.stream.write_all(&wire).await?;

        let deadline = Instant::now() + self.link.config().response_timeout;
        loop {
            let read = timeout_at(deadline, self.stream.read(&mut self.read_buf)).await;
            match read {
                Err(_elapsed) => return Err(TransportError::ResponseTimeout),
                Ok(Ok(0)) => return Err(TransportError::ConnectionClosed),
                Ok(Ok(n)) => {
                    let response = self.link.after_receive(&self.read_buf[..n])?;
                    if !response.is_empty() {
                        return Ok(response);
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
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
    pub async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
        self.link.reset();
    }
}
