//! RSA identity keys and the peer public key registry.
//!
//! Each session generates a fresh 2048-bit key pair that lives only in
//! memory. Users exchange public keys out of band (copy/paste of the Base64
//! X.509 encoding) and register them by username. Registered keys are also
//! written to `<local>_public_keys.txt` so the key management view can list
//! them; that file is truncated when a session starts and when it ends.

use std::{
    collections::HashMap,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use parley_proto::{ENVELOPE_SEPARATOR, Username};
use rand::rngs::OsRng;
use rsa::{
    Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey,
    pkcs8::{DecodePublicKey, EncodePublicKey},
};

use crate::{
    encoding,
    error::{CryptoError, Result},
};

/// RSA modulus size in bits.
pub const RSA_KEY_BITS: usize = 2048;

/// Suffix of the per-user registry file.
pub const PUBLIC_KEYS_FILE_SUFFIX: &str = "_public_keys.txt";

/// Local RSA key pair.
///
/// # Invariants
///
/// - `exported` is the Base64 X.509 encoding of `public`, computed once.
pub struct IdentityKeys {
    private: RsaPrivateKey,
    public: RsaPublicKey,
    exported: String,
}

impl IdentityKeys {
    /// Generate a fresh 2048-bit key pair from the OS RNG.
    ///
    /// # Errors
    ///
    /// - `KeyGeneration` if the generator or the public key encoder fails
    pub fn generate() -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| CryptoError::KeyGeneration { reason: e.to_string() })?;
        let public = RsaPublicKey::from(&private);

        let der = public
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyGeneration { reason: e.to_string() })?;
        let exported = encoding::encode(der.as_bytes());

        Ok(Self { private, public, exported })
    }

    /// Public key as Base64 X.509 `SubjectPublicKeyInfo`, for sharing.
    pub fn export_public(&self) -> &str {
        &self.exported
    }

    /// The public half.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Decrypt a PKCS#1 v1.5 ciphertext addressed to this identity.
    ///
    /// # Errors
    ///
    /// - `DecryptionFailed` for a wrong key or corrupt padding
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.private
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed { reason: e.to_string() })
    }
}

impl std::fmt::Debug for IdentityKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityKeys").field("public", &self.exported).finish_non_exhaustive()
    }
}

/// Parse a Base64 X.509 RSA public key.
///
/// # Errors
///
/// - `InvalidKeyEncoding` if the text is not Base64 or not an RSA key
pub fn parse_public_key(encoded: &str) -> Result<RsaPublicKey> {
    let der = encoding::decode(encoded.trim()).ok_or_else(|| CryptoError::InvalidKeyEncoding {
        reason: "not valid Base64".to_string(),
    })?;

    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| CryptoError::InvalidKeyEncoding { reason: e.to_string() })
}

/// Encrypt `plaintext` for the holder of `key` using PKCS#1 v1.5.
///
/// # Errors
///
/// - `EncryptionFailed` if the message is longer than one RSA block allows
///   (245 bytes for a 2048-bit key)
pub fn encrypt_for(key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    key.encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed { reason: e.to_string() })
}

/// Registry of peer public keys, mirrored to a per-user text file.
///
/// # Invariants
///
/// - Every in-memory entry was appended to the file when it was registered,
///   unless the file has since been reset.
/// - Registering the same username again replaces the in-memory key; the
///   file keeps both lines, the later one wins on display order only.
#[derive(Debug)]
pub struct KeyStore {
    path: PathBuf,
    peers: RwLock<HashMap<String, RsaPublicKey>>,
}

impl KeyStore {
    /// Create an empty registry for `local`, stored under `dir`.
    pub fn new(local: &Username, dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref().join(format!("{local}{PUBLIC_KEYS_FILE_SUFFIX}"));
        Self { path, peers: RwLock::new(HashMap::new()) }
    }

    /// Location of the registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register `username`'s public key from its Base64 export.
    ///
    /// The key is validated before anything is stored.
    ///
    /// # Errors
    ///
    /// - `InvalidPeerName` for an empty name or one containing `:`
    /// - `InvalidKeyEncoding` for malformed key text
    /// - `Io` if the registry file cannot be appended to (the in-memory entry
    ///   is kept)
    pub fn register_peer(&self, username: &str, encoded_key: &str) -> Result<()> {
        let username = username.trim();
        if username.is_empty() || username.contains(ENVELOPE_SEPARATOR) {
            return Err(CryptoError::InvalidPeerName(username.to_string()));
        }

        let encoded_key = encoded_key.trim();
        let key = parse_public_key(encoded_key)?;

        self.peers.write().unwrap_or_else(PoisonError::into_inner).insert(username.to_string(), key);
        tracing::debug!(peer = username, "registered public key");

        self.append_line(username, encoded_key)
    }

    /// Look up a registered peer key.
    pub fn lookup_peer(&self, username: &str) -> Option<RsaPublicKey> {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).get(username).cloned()
    }

    /// Registered usernames, sorted.
    pub fn registered_peers(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.peers.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every registered key and truncate the file.
    pub fn clear(&self) -> Result<()> {
        self.peers.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.reset_file()
    }

    /// Truncate (or create) the registry file. In-memory keys are kept.
    pub fn reset_file(&self) -> Result<()> {
        fs::write(&self.path, b"").map_err(|e| CryptoError::io(&self.path, e))
    }

    /// Raw `username:key` lines from the registry file.
    ///
    /// A missing file reads as empty.
    pub fn load_file_lines(&self) -> Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(CryptoError::io(&self.path, e)),
        }
    }

    fn append_line(&self, username: &str, encoded_key: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CryptoError::io(&self.path, e))?;

        writeln!(file, "{username}{ENVELOPE_SEPARATOR}{encoded_key}")
            .map_err(|e| CryptoError::io(&self.path, e))
    }
}
