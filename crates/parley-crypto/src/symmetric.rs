//! AES-128 message encryption for the pairwise variant.
//!
//! Ciphertexts are AES-128 in ECB mode with PKCS#7 padding and no IV. This
//! matches the block mode the first generation of clients used implicitly, so
//! the two remain wire compatible. ECB encrypts equal plaintext blocks to
//! equal ciphertext blocks; switching modes is a wire break and must be
//! versioned, not done in place.

use aes::Aes128;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, block_padding::Pkcs7};
use rand::{RngCore, rngs::OsRng};
use zeroize::Zeroize;

use crate::error::{CryptoError, Result};

type Aes128EcbEnc = ecb::Encryptor<Aes128>;
type Aes128EcbDec = ecb::Decryptor<Aes128>;

/// AES-128 key size in bytes.
pub const PAIR_KEY_SIZE: usize = 16;

/// Shared AES-128 key for one unordered pair of users.
#[derive(Clone, PartialEq, Eq)]
pub struct PairKey {
    key: [u8; PAIR_KEY_SIZE],
}

impl PairKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut key = [0u8; PAIR_KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Wrap raw key bytes as read from a key file.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength` unless exactly 16 bytes are given
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key = <[u8; PAIR_KEY_SIZE]>::try_from(bytes).map_err(|_| {
            CryptoError::InvalidKeyLength { expected: PAIR_KEY_SIZE, actual: bytes.len() }
        })?;
        Ok(Self { key })
    }

    /// Raw key bytes, for persisting.
    pub fn as_bytes(&self) -> &[u8; PAIR_KEY_SIZE] {
        &self.key
    }

    /// Encrypt with PKCS#7 padding. Output is a multiple of 16 bytes.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        Aes128EcbEnc::new(&self.key.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    /// Decrypt and strip PKCS#7 padding.
    ///
    /// # Errors
    ///
    /// - `DecryptionFailed` for a ragged length or invalid padding, which is
    ///   what a wrong key usually produces
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        Aes128EcbDec::new(&self.key.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed { reason: "invalid padding".to_string() })
    }
}

impl std::fmt::Debug for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PairKey(..)")
    }
}

impl Drop for PairKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}
