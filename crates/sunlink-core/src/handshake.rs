//! Key-exchange handshake with the device.
//!
//! Immediately after the TCP connection opens, the client sends one
//! fixed discovery request (a Modbus read of the key registers) and
//! waits for the device's reply, which carries the 16-byte per-session
//! public value. Three reply shapes exist in the wild:
//!
//! * 25 bytes - a full Modbus response, public value in bytes `9..25`;
//! * 17 bytes - older firmware strips the MBAP header, value in `1..17`;
//! * a 9-byte Modbus exception - the device has no key registers at all.
//!
//! The 17-byte form is a strict prefix of the 25-byte form, and the
//! 9-byte exception is indistinguishable from a prefix of either (key
//! bytes can mimic the exception signature at those offsets), so both
//! are only committed once the response deadline expires with exactly
//! that many bytes buffered.

use crate::error::HandshakeError;
use sunlink_crypto::{PRIVATE_KEY, PublicValue, SessionKey};

/// Fixed discovery request: read 8 input registers at address 0x0AE7,
/// unit 0xF7, transaction id 0x6868.
pub const DISCOVERY_REQUEST: [u8; 12] = [
    0x68, 0x68, 0x00, 0x00, 0x00, 0x06, 0xF7, 0x04, 0x0A, 0xE7, 0x00, 0x08,
];

const RESPONSE_LEN: usize = 25;
const KEY_OFFSET: usize = 9;
const SHORT_RESPONSE_LEN: usize = 17;
const SHORT_KEY_OFFSET: usize = 1;
const EXCEPTION_LEN: usize = 9;

/// Result of a completed handshake.
pub enum HandshakeOutcome {
    /// The device returned a usable public value; the session key is
    /// derived and every subsequent request is encrypted.
    Encrypted(SessionKey),
    /// The device answered with a "no encryption" sentinel; the session
    /// runs as ordinary cleartext Modbus TCP.
    Plaintext,
}

/// Accumulates handshake response bytes and classifies the reply.
///
/// Byte-oriented like the [`Reassembler`](crate::Reassembler): the
/// caller feeds whatever each read returned and is told when the
/// exchange has concluded.
#[derive(Debug, Default)]
pub struct HandshakeNegotiator {
    buf: Vec<u8>,
    consumed: usize,
}

impl HandshakeNegotiator {
    /// Create an empty negotiator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes read from the transport.
    ///
    /// Returns `Ok(None)` while the response is still incomplete and
    /// `Ok(Some(outcome))` once the full 25-byte form has arrived. The
    /// 17-byte short form and the 9-byte exception reply cannot be
    /// recognized here - both are prefixes of the long form, and in
    /// the short form the bytes where an exception signature would sit
    /// are device-chosen key material. They are committed by
    /// [`deadline`](Self::deadline).
    ///
    /// # Errors
    ///
    /// Returns `HandshakeError::Malformed` if the key field cannot be
    /// extracted.
    pub fn feed(&mut self, data: &[u8]) -> Result<Option<HandshakeOutcome>, HandshakeError> {
        self.buf.extend_from_slice(data);

        if self.buf.len() < RESPONSE_LEN {
            return Ok(None);
        }
        self.consumed = RESPONSE_LEN;
        let outcome = classify(&self.buf[KEY_OFFSET..KEY_OFFSET + 16])?;
        Ok(Some(outcome))
    }

    /// Conclude the exchange when the response deadline expires.
    ///
    /// Exactly 17 buffered bytes commit the short-form reply, and
    /// exactly 9 bytes carrying the exception signature (MBAP length
    /// `0x0003`, high bit set on the echoed function code) commit the
    /// "no key registers" reply. Anything else at this point is a
    /// failed handshake.
    ///
    /// # Errors
    ///
    /// Returns `HandshakeError::Timeout` when no bytes arrived at all,
    /// `HandshakeError::Unsupported` for the exception reply, or
    /// `HandshakeError::TooShort` for any other incomplete length.
    pub fn deadline(&mut self) -> Result<HandshakeOutcome, HandshakeError> {
        match self.buf.len() {
            0 => Err(HandshakeError::Timeout),
            EXCEPTION_LEN if self.buf[4..6] == [0x00, 0x03] && self.buf[7] & 0x80 != 0 => {
                Err(HandshakeError::Unsupported)
            }
            SHORT_RESPONSE_LEN => {
                self.consumed = SHORT_RESPONSE_LEN;
                classify(&self.buf[SHORT_KEY_OFFSET..SHORT_KEY_OFFSET + 16])
            }
            len => Err(HandshakeError::TooShort { len }),
        }
    }

    /// Take any bytes that arrived after the handshake response. They
    /// belong to the encrypted stream and must seed the reassembler.
    pub fn take_remainder(&mut self) -> Vec<u8> {
        let remainder = self.buf.split_off(self.consumed);
        self.buf.clear();
        self.consumed = 0;
        remainder
    }

    /// Discard all buffered state.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.consumed = 0;
    }
}

fn classify(key_field: &[u8]) -> Result<HandshakeOutcome, HandshakeError> {
    let public = PublicValue::from_slice(key_field).map_err(|_| HandshakeError::Malformed)?;
    if public.is_sentinel() {
        tracing::debug!("device opted out of encryption");
        return Ok(HandshakeOutcome::Plaintext);
    }
    let key = SessionKey::derive(&PRIVATE_KEY, &public).map_err(|_| HandshakeError::Malformed)?;
    tracing::debug!("session key established");
    Ok(HandshakeOutcome::Encrypted(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_response(public: [u8; 16]) -> Vec<u8> {
        // MBAP echo + unit + function + byte count, then the key field
        let mut response = vec![0x68, 0x68, 0x00, 0x00, 0x00, 0x13, 0xF7, 0x04, 0x10];
        response.extend_from_slice(&public);
        response
    }

    fn short_response(public: [u8; 16]) -> Vec<u8> {
        let mut response = vec![0x10];
        response.extend_from_slice(&public);
        response
    }

    #[test]
    fn test_full_response_derives_key() {
        let mut n = HandshakeNegotiator::new();
        let outcome = n.feed(&full_response([0xAB; 16])).unwrap().unwrap();

        let HandshakeOutcome::Encrypted(key) = outcome else {
            panic!("expected an encrypted session");
        };
        for (i, byte) in key.as_bytes().iter().enumerate() {
            assert_eq!(*byte, PRIVATE_KEY.as_bytes()[i] ^ 0xAB);
        }
    }

    #[test]
    fn test_full_response_split_across_reads() {
        let response = full_response([0x55; 16]);
        let mut n = HandshakeNegotiator::new();
        assert!(n.feed(&response[..10]).unwrap().is_none());
        assert!(n.feed(&response[10..20]).unwrap().is_none());
        assert!(matches!(
            n.feed(&response[20..]),
            Ok(Some(HandshakeOutcome::Encrypted(_)))
        ));
    }

    #[test]
    fn test_sentinel_means_plaintext_session() {
        let mut n = HandshakeNegotiator::new();
        assert!(matches!(
            n.feed(&full_response([0xFF; 16])),
            Ok(Some(HandshakeOutcome::Plaintext))
        ));

        let mut n = HandshakeNegotiator::new();
        assert!(matches!(
            n.feed(&full_response([0x00; 16])),
            Ok(Some(HandshakeOutcome::Plaintext))
        ));
    }

    #[test]
    fn test_short_form_committed_at_deadline() {
        let mut n = HandshakeNegotiator::new();
        assert!(n.feed(&short_response([0xCD; 16])).unwrap().is_none());

        let HandshakeOutcome::Encrypted(key) = n.deadline().unwrap() else {
            panic!("expected an encrypted session");
        };
        for (i, byte) in key.as_bytes().iter().enumerate() {
            assert_eq!(*byte, PRIVATE_KEY.as_bytes()[i] ^ 0xCD);
        }
    }

    #[test]
    fn test_deadline_with_nothing_is_timeout() {
        let mut n = HandshakeNegotiator::new();
        assert!(matches!(n.deadline(), Err(HandshakeError::Timeout)));
    }

    #[test]
    fn test_deadline_with_fragment_is_too_short() {
        let mut n = HandshakeNegotiator::new();
        n.feed(&[0x10, 0x01, 0x02]).unwrap();
        assert!(matches!(
            n.deadline(),
            Err(HandshakeError::TooShort { len: 3 })
        ));
    }

    #[test]
    fn test_exception_reply_commits_at_deadline() {
        let mut n = HandshakeNegotiator::new();
        let exception = [0x68, 0x68, 0x00, 0x00, 0x00, 0x03, 0xF7, 0x84, 0x02];
        // 9 bytes could still grow into a key reply, so feed stays
        // pending and the deadline makes the call
        assert!(n.feed(&exception).unwrap().is_none());
        assert!(matches!(n.deadline(), Err(HandshakeError::Unsupported)));
    }

    #[test]
    fn test_nine_bytes_without_exception_signature_too_short() {
        let mut n = HandshakeNegotiator::new();
        n.feed(&[0x10, 1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert!(matches!(
            n.deadline(),
            Err(HandshakeError::TooShort { len: 9 })
        ));
    }

    #[test]
    fn test_short_form_high_bit_key_byte_not_an_exception() {
        // Key byte at offset 7 with the high bit set must not be
        // mistaken for an exception function code.
        let mut n = HandshakeNegotiator::new();
        assert!(n.feed(&short_response([0x84; 16])).unwrap().is_none());
        assert!(matches!(
            n.deadline(),
            Ok(HandshakeOutcome::Encrypted(_))
        ));
    }

    #[test]
    fn test_short_form_key_mimicking_exception_signature() {
        // Worst case: the key places 00 03 at buffer offsets 4..6 and
        // a high-bit byte at offset 7, exactly where an exception
        // reply carries its signature. Still a valid key reply.
        let mut key = [0x42u8; 16];
        key[3] = 0x00;
        key[4] = 0x03;
        key[6] = 0x84;

        let mut n = HandshakeNegotiator::new();
        assert!(n.feed(&short_response(key)).unwrap().is_none());

        let HandshakeOutcome::Encrypted(derived) = n.deadline().unwrap() else {
            panic!("expected an encrypted session");
        };
        for (i, byte) in derived.as_bytes().iter().enumerate() {
            assert_eq!(*byte, PRIVATE_KEY.as_bytes()[i] ^ key[i]);
        }
    }

    #[test]
    fn test_remainder_after_response_preserved() {
        let mut response = full_response([0x11; 16]);
        response.extend_from_slice(&[0xDE, 0xAD, 0xBE]);

        let mut n = HandshakeNegotiator::new();
        assert!(n.feed(&response).unwrap().is_some());
        assert_eq!(n.take_remainder(), vec![0xDE, 0xAD, 0xBE]);
    }

    #[test]
    fn test_discovery_request_shape() {
        assert_eq!(DISCOVERY_REQUEST.len(), 12);
        // MBAP length field covers unit + function + 4 data bytes
        assert_eq!(&DISCOVERY_REQUEST[4..6], &[0x00, 0x06]);
        assert_eq!(DISCOVERY_REQUEST[7], 0x04);
    }
}
