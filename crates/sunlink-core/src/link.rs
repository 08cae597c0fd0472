//! Per-connection session state machine.
//!
//! [`SecureLink`] ties the handshake, the frame codec and the stream
//! reassembler together behind two interception points that an existing
//! Modbus client wraps around its socket I/O. It owns no socket itself;
//! the transport crate (or any caller) moves the bytes.
//!
//! State transitions:
//!
//! ```text
//! Init ──begin_handshake──▶ Handshake ──key derived──▶ Crypto
//!   ▲                           │
//!   │                           └──sentinel / unsupported──▶ NoCrypto
//!   └────────────── reset (on disconnect) ◀──────────────────────┘
//! ```

use crate::config::LinkConfig;
use crate::error::{Error, LinkError};
use crate::frame::FrameCodec;
use crate::handshake::{DISCOVERY_REQUEST, HandshakeNegotiator, HandshakeOutcome};
use crate::reassembly::Reassembler;
use sunlink_crypto::EcbCipher;

/// Session state of one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Connected (or not yet connected); no handshake attempted.
    Init,
    /// Discovery request sent, awaiting the device's reply.
    Handshake,
    /// Session key established; requests and responses are encrypted.
    Crypto,
    /// The device declined encryption; bytes pass through untouched.
    NoCrypto,
}

/// Result of feeding handshake response bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeProgress {
    /// The response is still incomplete; read more bytes.
    Pending,
    /// The handshake concluded and the link moved to the given state.
    Complete(LinkState),
}

/// Per-connection encryption shim.
///
/// In `Init` and `NoCrypto` the interception points pass bytes through
/// untouched, so a wrapped client behaves identically against devices
/// that never encrypt.
#[derive(Debug)]
pub struct SecureLink {
    config: LinkConfig,
    state: LinkState,
    negotiator: HandshakeNegotiator,
    codec: FrameCodec,
    reassembler: Reassembler,
    cipher: Option<EcbCipher>,
}

impl SecureLink {
    /// Create a link in the `Init` state.
    #[must_use]
    pub fn new(config: LinkConfig) -> Self {
        let codec = FrameCodec::new(config.length_mode);
        Self {
            config,
            state: LinkState::Init,
            negotiator: HandshakeNegotiator::new(),
            codec,
            reassembler: Reassembler::new(),
            cipher: None,
        }
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Link configuration (timeouts belong to the transport driving
    /// this state machine).
    #[must_use]
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Start the key exchange. Returns the discovery request the caller
    /// must write to the freshly opened connection.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::InvalidState` unless the link is in `Init`.
    pub fn begin_handshake(&mut self) -> Result<&'static [u8], Error> {
        if self.state != LinkState::Init {
            return Err(self.invalid_state("begin_handshake"));
        }
        self.transition(LinkState::Handshake);
        Ok(&DISCOVERY_REQUEST)
    }

    /// Feed bytes read while awaiting the handshake response.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::InvalidState` outside of `Handshake`, or the
    /// underlying [`HandshakeError`](crate::HandshakeError) if the
    /// response is malformed.
    pub fn handshake_feed(&mut self, data: &[u8]) -> Result<HandshakeProgress, Error> {
        if self.state != LinkState::Handshake {
            return Err(self.invalid_state("handshake_feed"));
        }
        Ok(match self.negotiator.feed(data)? {
            None => HandshakeProgress::Pending,
            Some(outcome) => self.complete(outcome),
        })
    }

    /// Conclude the handshake when the configured response deadline
    /// expires without [`handshake_feed`](Self::handshake_feed) having
    /// completed. This is where the 17-byte short-form reply commits,
    /// and where a device that answered the discovery request with a
    /// Modbus exception - it has no key registers - concludes the
    /// handshake as a cleartext session rather than failing it.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::InvalidState` outside of `Handshake`,
    /// `HandshakeError::Timeout` when nothing arrived, or
    /// `HandshakeError::TooShort` for a truncated response.
    pub fn handshake_deadline(&mut self) -> Result<HandshakeProgress, Error> {
        if self.state != LinkState::Handshake {
            return Err(self.invalid_state("handshake_deadline"));
        }
        match self.negotiator.deadline() {
            Ok(outcome) => Ok(self.complete(outcome)),
            Err(crate::HandshakeError::Unsupported) => {
                tracing::warn!("device rejected the discovery request, staying cleartext");
                Ok(self.complete(HandshakeOutcome::Plaintext))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Intercept a request about to be written to the transport.
    ///
    /// Encrypts and frames in `Crypto`; passes through untouched in
    /// `Init` and `NoCrypto`.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::InvalidState` during the handshake, or a
    /// [`FrameError`](crate::FrameError) for an unencodable request.
    pub fn before_send(&mut self, request: &[u8]) -> Result<Vec<u8>, Error> {
        match self.state {
            LinkState::Crypto => {
                let cipher = self.cipher.as_ref().ok_or_else(|| self.missing_cipher())?;
                Ok(self.codec.encode(cipher, request)?)
            }
            LinkState::Init | LinkState::NoCrypto => Ok(request.to_vec()),
            LinkState::Handshake => Err(self.invalid_state("before_send")),
        }
    }

    /// Intercept bytes just read from the transport.
    ///
    /// In `Crypto` the bytes are buffered and every complete frame is
    /// decrypted and reconstructed; the returned vector holds zero or
    /// more whole responses in arrival order (empty means "read more").
    /// In `Init` and `NoCrypto` the bytes pass through untouched.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::InvalidState` during the handshake, or a
    /// [`FrameError`](crate::FrameError) on a corrupt stream. Frame
    /// errors are fatal; the caller must close the connection.
    pub fn after_receive(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        match self.state {
            LinkState::Crypto => {
                let Self {
                    config,
                    codec,
                    reassembler,
                    cipher,
                    ..
                } = self;
                let cipher = cipher.as_ref().ok_or(Error::Link(LinkError::InvalidState {
                    state: LinkState::Crypto,
                    op: "after_receive without a cipher",
                }))?;

                reassembler.extend(data);
                let mut out = Vec::new();
                while let Some((header, body)) = reassembler.next_frame(config.length_mode)? {
                    out.extend(codec.decode(cipher, header, body)?);
                }
                Ok(out)
            }
            LinkState::Init | LinkState::NoCrypto => Ok(data.to_vec()),
            LinkState::Handshake => Err(self.invalid_state("after_receive")),
        }
    }

    /// Return to `Init`, discarding the session key, the cached
    /// transaction id and all buffered bytes. Call on every disconnect;
    /// the next connection negotiates a fresh key.
    pub fn reset(&mut self) {
        self.negotiator.clear();
        self.codec.clear();
        self.reassembler.clear();
        self.cipher = None;
        self.transition(LinkState::Init);
    }

    fn complete(&mut self, outcome: HandshakeOutcome) -> HandshakeProgress {
        match outcome {
            HandshakeOutcome::Encrypted(key) => {
                self.cipher = Some(EcbCipher::new(&key));
                // bytes past the response already belong to the
                // encrypted stream
                let remainder = self.negotiator.take_remainder();
                self.reassembler.extend(&remainder);
                self.transition(LinkState::Crypto);
            }
            HandshakeOutcome::Plaintext => {
                self.negotiator.clear();
                self.transition(LinkState::NoCrypto);
            }
        }
        HandshakeProgress::Complete(self.state)
    }

    fn transition(&mut self, next: LinkState) {
        tracing::debug!(from = ?self.state, to = ?next, "link state transition");
        self.state = next;
    }

    fn invalid_state(&self, op: &'static str) -> Error {
        Error::Link(LinkError::InvalidState {
            state: self.state,
            op,
        })
    }

    fn missing_cipher(&self) -> Error {
        Error::Link(LinkError::InvalidState {
            state: self.state,
            op: "encrypt without a cipher",
        })
    }
}
