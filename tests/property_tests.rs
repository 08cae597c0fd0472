//! Property-based tests for the link layer.
//!
//! These drive a client-side `SecureLink` against a pure-function
//! device model (no sockets) so proptest can shrink failures.

use proptest::prelude::*;
use sunlink_core::{
    FRAME_MARKER, HandshakeProgress, LinkConfig, LinkState, SecureLink,
};
use sunlink_crypto::{BLOCK_SIZE, EcbCipher, PRIVATE_KEY, PublicValue, SessionKey};

fn handshake_reply(public: [u8; 16]) -> Vec<u8> {
    let mut reply = vec![0x68, 0x68, 0x00, 0x00, 0x00, 0x13, 0xF7, 0x04, 0x10];
    reply.extend_from_slice(&public);
    reply
}

fn crypto_link(public: [u8; 16]) -> SecureLink {
    let mut link = SecureLink::new(LinkConfig::default());
    link.begin_handshake().unwrap();
    let progress = link.handshake_feed(&handshake_reply(public)).unwrap();
    assert_eq!(progress, HandshakeProgress::Complete(LinkState::Crypto));
    link
}

/// Device model: validate one request frame and echo it re-encrypted.
fn device_echo(cipher: &EcbCipher, frame: &[u8]) -> Vec<u8> {
    assert_eq!(frame[0], 0x01);
    let len = frame[2] as usize;
    let padding = frame[3] as usize;
    assert_eq!(frame.len(), 4 + len + padding);

    let mut body = frame[4..].to_vec();
    cipher.decrypt_blocks(&mut body).unwrap();
    assert_eq!(body[..2], FRAME_MARKER);
    assert!(body[len..].iter().all(|&b| b == 0xFF));

    cipher.encrypt_blocks(&mut body).unwrap();
    let mut reply = frame[..4].to_vec();
    reply.extend_from_slice(&body);
    reply
}

fn device_cipher(public: [u8; 16]) -> EcbCipher {
    let key = SessionKey::derive(&PRIVATE_KEY, &PublicValue::from_bytes(public)).unwrap();
    EcbCipher::new(&key)
}

fn non_sentinel_public() -> impl Strategy<Value = [u8; 16]> {
    proptest::array::uniform16(any::<u8>())
        .prop_filter("sentinel", |p| !PublicValue::from_bytes(*p).is_sentinel())
}

proptest! {
    /// Any request up to 255 bytes survives the full encrypt, echo,
    /// reassemble, decrypt cycle under any session key.
    #[test]
    fn prop_end_to_end_roundtrip(
        public in non_sentinel_public(),
        request in proptest::collection::vec(any::<u8>(), 1..=255),
    ) {
        let mut link = crypto_link(public);
        let cipher = device_cipher(public);

        let wire = link.before_send(&request).unwrap();
        let reply = device_echo(&cipher, &wire);
        prop_assert_eq!(link.after_receive(&reply).unwrap(), request);
    }

    /// The padded body is always block aligned with padding in [1, 16].
    #[test]
    fn prop_frames_are_block_aligned(
        request in proptest::collection::vec(any::<u8>(), 1..=255),
    ) {
        let mut link = crypto_link([0x5A; 16]);
        let wire = link.before_send(&request).unwrap();

        let padding = wire[3] as usize;
        prop_assert!((1..=BLOCK_SIZE).contains(&padding));
        prop_assert_eq!((wire.len() - 4) % BLOCK_SIZE, 0);
        prop_assert_eq!(wire.len() - 4, request.len() + padding);
    }

    /// Reassembly is invariant under how the reply bytes are chunked.
    #[test]
    fn prop_chunking_invariance(
        request in proptest::collection::vec(any::<u8>(), 2..=64),
        cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..6),
    ) {
        let public = [0x5A; 16];
        let mut link = crypto_link(public);
        let cipher = device_cipher(public);

        let wire = link.before_send(&request).unwrap();
        let reply = device_echo(&cipher, &wire);

        let mut offsets: Vec<usize> = cuts.iter().map(|i| i.index(reply.len())).collect();
        offsets.push(0);
        offsets.push(reply.len());
        offsets.sort_unstable();

        let mut out = Vec::new();
        for pair in offsets.windows(2) {
            out.extend(link.after_receive(&reply[pair[0]..pair[1]]).unwrap());
        }
        prop_assert_eq!(out, request);
    }

    /// Several outstanding replies to the same request decode in FIFO
    /// order from a single delivery.
    #[test]
    fn prop_concatenated_replies_fifo(
        request in proptest::collection::vec(any::<u8>(), 2..=32),
        copies in 1usize..4,
    ) {
        let public = [0x21; 16];
        let mut link = crypto_link(public);
        let cipher = device_cipher(public);

        let wire = link.before_send(&request).unwrap();
        let reply = device_echo(&cipher, &wire);

        let mut stream = Vec::new();
        let mut expected = Vec::new();
        for _ in 0..copies {
            stream.extend_from_slice(&reply);
            expected.extend_from_slice(&request);
        }
        prop_assert_eq!(link.after_receive(&stream).unwrap(), expected);
    }
}
