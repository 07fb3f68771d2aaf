//! Error types for key management and message encryption

use std::{io, path::PathBuf};

use thiserror::Error;

/// Result alias for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors from key management and encryption operations
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption was requested but no recipient was named
    #[error("no recipient specified for encryption")]
    MissingRecipient,

    /// No public key has been registered for the recipient
    #[error("no public key registered for user {username:?}")]
    UnknownRecipient {
        /// The recipient that has no key material
        username: String,
    },

    /// Pasted public key is not valid Base64 X.509 RSA key material
    #[error("invalid public key encoding: {reason}")]
    InvalidKeyEncoding {
        /// Why the key was rejected
        reason: String,
    },

    /// Peer name is empty or cannot appear in an envelope
    #[error("invalid peer name {0:?}")]
    InvalidPeerName(String),

    /// Encryption was requested but this client has no encryption variant
    #[error("encryption is not available in plaintext mode")]
    EncryptionUnavailable,

    /// Operation only exists in another encryption variant
    #[error("{0} is not supported in this encryption mode")]
    Unsupported(&'static str),

    /// Cipher rejected the plaintext (e.g. too long for one RSA block)
    #[error("encryption failed: {reason}")]
    EncryptionFailed {
        /// Reason reported by the cipher
        reason: String,
    },

    /// Wrong key, corrupt padding or malformed ciphertext
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Reason for decryption failure
        reason: String,
    },

    /// Stored key material has the wrong size
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },

    /// Key pair generation failed
    #[error("key generation failed: {reason}")]
    KeyGeneration {
        /// Reason reported by the generator
        reason: String,
    },

    /// Reading or writing a key file failed
    #[error("key file {path}: {source}")]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl CryptoError {
    /// Returns true if the user can fix this error and try again.
    ///
    /// User-correctable errors are reported for the one message or key
    /// registration they affect; the session keeps running either way.
    pub fn is_user_correctable(&self) -> bool {
        match self {
            Self::MissingRecipient => true,
            Self::UnknownRecipient { .. } => true,
            Self::InvalidKeyEncoding { .. } => true,
            Self::InvalidPeerName(_) => true,
            Self::EncryptionUnavailable => true,
            Self::Unsupported(_) => true,
            Self::EncryptionFailed { .. } => true,

            Self::DecryptionFailed { .. } => false,
            Self::InvalidKeyLength { .. } => false,
            Self::KeyGeneration { .. } => false,
            Self::Io { .. } => false,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
