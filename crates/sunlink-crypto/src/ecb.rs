//! AES-128 electronic-codebook block operations.
//!
//! The inverter encrypts every frame body with AES-128 in ECB mode:
//! each 16-byte block independently, same key, no IV, no chaining, no
//! authentication tag. This must be reproduced exactly; the lack of
//! semantic security is an on-wire property of the device.

use crate::key::SessionKey;
use crate::{BLOCK_SIZE, CryptoError};
use aes::Aes128;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

/// AES-128-ECB cipher keyed by one session key.
///
/// Holds the expanded round keys; one instance per encrypted session.
pub struct EcbCipher {
    cipher: Aes128,
}

impl core::fmt::Debug for EcbCipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("EcbCipher")
    }
}

impl EcbCipher {
    /// Create a cipher from a derived session key.
    #[must_use]
    pub fn new(key: &SessionKey) -> Self {
        Self {
            cipher: Aes128::new(key.as_bytes().into()),
        }
    }

    /// Encrypt a block-aligned buffer in place.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::NotBlockAligned` if the buffer length is
    /// not a multiple of 16. That is a framing bug in the caller, never
    /// a condition expected from the wire.
    pub fn encrypt_blocks(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        check_alignment(buf.len())?;
        for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.encrypt_block(aes::Block::from_mut_slice(chunk));
        }
        Ok(())
    }

    /// Decrypt a block-aligned buffer in place.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::NotBlockAligned` if the buffer length is
    /// not a multiple of 16.
    pub fn decrypt_blocks(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        check_alignment(buf.len())?;
        for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.decrypt_block(aes::Block::from_mut_slice(chunk));
        }
        Ok(())
    }
}

fn check_alignment(len: usize) -> Result<(), CryptoError> {
    if len % BLOCK_SIZE != 0 {
        return Err(CryptoError::NotBlockAligned { len });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher_from(key: [u8; 16]) -> EcbCipher {
        EcbCipher::new(&SessionKey::from_bytes(key))
    }

    #[test]
    fn test_fips_197_vector() {
        // FIPS-197 appendix C.1
        let key: [u8; 16] = hex::decode("000102030405060708090a0b0c0d0e0f")
            .unwrap()
            .try_into()
            .unwrap();
        let mut block: Vec<u8> = hex::decode("00112233445566778899aabbccddeeff").unwrap();

        let cipher = cipher_from(key);
        cipher.encrypt_blocks(&mut block).unwrap();
        assert_eq!(hex::encode(&block), "69c4e0d86a7b0430d8cdb78070b4c55a");

        cipher.decrypt_blocks(&mut block).unwrap();
        assert_eq!(hex::encode(&block), "00112233445566778899aabbccddeeff");
    }

    #[test]
    fn test_ecb_identical_blocks_encrypt_identically() {
        // The defining (and infamous) ECB property
        let cipher = cipher_from([0x42; 16]);
        let mut buf = [0xABu8; 32];
        cipher.encrypt_blocks(&mut buf).unwrap();
        assert_eq!(buf[..16], buf[16..]);
    }

    #[test]
    fn test_roundtrip_multiple_blocks() {
        let cipher = cipher_from([7; 16]);
        let original: Vec<u8> = (0..48).collect();
        let mut buf = original.clone();

        cipher.encrypt_blocks(&mut buf).unwrap();
        assert_ne!(buf, original);
        cipher.decrypt_blocks(&mut buf).unwrap();
        assert_eq!(buf, original);
    }

    #[test]
    fn test_unaligned_input_rejected() {
        let cipher = cipher_from([0; 16]);
        let mut buf = [0u8; 17];
        assert!(matches!(
            cipher.encrypt_blocks(&mut buf),
            Err(CryptoError::NotBlockAligned { len: 17 })
        ));
        let mut buf = [0u8; 15];
        assert!(matches!(
            cipher.decrypt_blocks(&mut buf),
            Err(CryptoError::NotBlockAligned { len: 15 })
        ));
    }

    #[test]
    fn test_empty_buffer_is_noop() {
        let cipher = cipher_from([0; 16]);
        let mut buf = [0u8; 0];
        cipher.encrypt_blocks(&mut buf).unwrap();
        cipher.decrypt_blocks(&mut buf).unwrap();
    }

    proptest::proptest! {
        #[test]
        fn prop_encrypt_then_decrypt_is_identity(
            key in proptest::array::uniform16(0u8..),
            blocks in proptest::collection::vec(proptest::array::uniform16(0u8..), 1..8),
        ) {
            let original: Vec<u8> = blocks.iter().flatten().copied().collect();
            let cipher = cipher_from(key);
            let mut buf = original.clone();
            cipher.encrypt_blocks(&mut buf).unwrap();
            cipher.decrypt_blocks(&mut buf).unwrap();
            proptest::prop_assert_eq!(buf, original);
        }
    }
}
