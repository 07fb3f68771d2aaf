//! Per-message encryption policy.
//!
//! [`EncryptionStrategy`] decides, for every outgoing message, whether and
//! how to transform it before it is framed, and for every incoming message,
//! whether to attempt decryption before it is displayed.
//!
//! Outbound encryption is opt-in per message. Inbound decryption is guessed:
//! a message that is valid Base64 is treated as possible ciphertext (see
//! [`crate::encoding`]), and any failure to decrypt falls back to showing the
//! text exactly as received. A bad or foreign ciphertext must never take
//! down the receive loop.

use std::{fmt, path::Path, str::FromStr};

use parley_proto::Username;

use crate::{
    asymmetric::{self, IdentityKeys, KeyStore},
    encoding,
    error::{CryptoError, Result},
    pairwise::PairwiseKeyStore,
};

/// Which encryption variant a client runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// No encryption; messages are always sent and shown as-is.
    #[default]
    None,
    /// Per-user RSA key pairs, peer public keys registered by hand.
    AsymmetricRsa,
    /// Per-pair AES keys shared through the file system.
    SymmetricAesPairwise,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "plain",
            Self::AsymmetricRsa => "rsa",
            Self::SymmetricAesPairwise => "aes",
        })
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "none" => Ok(Self::None),
            "rsa" | "asymmetric" => Ok(Self::AsymmetricRsa),
            "aes" | "symmetric" => Ok(Self::SymmetricAesPairwise),
            other => Err(format!("unknown encryption mode {other:?} (expected plain, rsa or aes)")),
        }
    }
}

/// A received message after the decryption policy ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Text to display
    pub text: String,
    /// True if `text` is the result of a successful decryption
    pub encrypted: bool,
}

impl Inbound {
    fn plain(text: &str) -> Self {
        Self { text: text.to_string(), encrypted: false }
    }
}

/// Key material and cipher for one encryption variant.
pub enum EncryptionStrategy {
    /// Plaintext baseline.
    None,
    /// RSA-2048 with PKCS#1 v1.5 padding.
    AsymmetricRsa {
        /// Local key pair, never persisted
        identity: IdentityKeys,
        /// Registered peer public keys
        registry: KeyStore,
    },
    /// AES-128 keyed per unordered pair of users.
    SymmetricAesPairwise(PairwiseKeyStore),
}

impl EncryptionStrategy {
    /// Build the strategy for `kind`, rooted at `key_dir`.
    ///
    /// The asymmetric variant generates its RSA key pair here.
    ///
    /// # Errors
    ///
    /// - `KeyGeneration` if the RSA key pair cannot be generated
    pub fn new(kind: StrategyKind, local: &Username, key_dir: &Path) -> Result<Self> {
        Ok(match kind {
            StrategyKind::None => Self::None,
            StrategyKind::AsymmetricRsa => Self::AsymmetricRsa {
                identity: IdentityKeys::generate()?,
                registry: KeyStore::new(local, key_dir),
            },
            StrategyKind::SymmetricAesPairwise => {
                Self::SymmetricAesPairwise(PairwiseKeyStore::new(local.clone(), key_dir))
            },
        })
    }

    /// The variant this strategy implements.
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::None => StrategyKind::None,
            Self::AsymmetricRsa { .. } => StrategyKind::AsymmetricRsa,
            Self::SymmetricAesPairwise(_) => StrategyKind::SymmetricAesPairwise,
        }
    }

    /// Outbound policy.
    ///
    /// Returns `plaintext` unchanged when `enabled` is false. Otherwise
    /// returns `Base64(cipher(plaintext))` for `recipient_hint`.
    ///
    /// # Errors
    ///
    /// - `MissingRecipient` if encryption is enabled and no recipient is given
    /// - `UnknownRecipient` if no public key is registered (asymmetric only;
    ///   the symmetric variant creates the pair key instead)
    /// - `EncryptionUnavailable` under the plaintext strategy
    /// - `EncryptionFailed` / `Io` from the cipher or key file
    pub fn maybe_encrypt(
        &self,
        plaintext: &str,
        recipient_hint: &str,
        enabled: bool,
    ) -> Result<String> {
        if !enabled {
            return Ok(plaintext.to_string());
        }

        let recipient = recipient_hint.trim();
        if recipient.is_empty() {
            return Err(CryptoError::MissingRecipient);
        }

        let ciphertext = match self {
            Self::None => return Err(CryptoError::EncryptionUnavailable),
            Self::AsymmetricRsa { registry, .. } => {
                let key = registry.lookup_peer(recipient).ok_or_else(|| {
                    CryptoError::UnknownRecipient { username: recipient.to_string() }
                })?;
                asymmetric::encrypt_for(&key, plaintext.as_bytes())?
            },
            Self::SymmetricAesPairwise(store) => {
                store.key_for_peer(recipient)?.encrypt(plaintext.as_bytes())
            },
        };

        Ok(encoding::encode(&ciphertext))
    }

    /// Inbound policy. Never fails.
    ///
    /// Text that is not Base64 is returned unchanged without touching any key
    /// material. Base64 text is decrypted with the local private key
    /// (asymmetric) or the existing pair key for `sender` (symmetric); if
    /// there is no key or decryption fails the original text is returned.
    pub fn maybe_decrypt(&self, received: &str, sender: &str) -> Inbound {
        let Some(ciphertext) = encoding::looks_like_ciphertext(received) else {
            return Inbound::plain(received);
        };

        let decrypted = match self {
            Self::None => return Inbound::plain(received),
            Self::AsymmetricRsa { identity, .. } => identity.decrypt(&ciphertext),
            Self::SymmetricAesPairwise(store) => match store.existing_key_for_peer(sender) {
                Ok(Some(key)) => key.decrypt(&ciphertext),
                Ok(None) => {
                    tracing::trace!(sender, "no pair key, treating as plaintext");
                    return Inbound::plain(received);
                },
                Err(e) => Err(e),
            },
        };

        match decrypted {
            Ok(bytes) => {
                Inbound { text: String::from_utf8_lossy(&bytes).into_owned(), encrypted: true }
            },
            Err(e) => {
                tracing::debug!(sender, error = %e, "decryption failed, showing original text");
                Inbound::plain(received)
            },
        }
    }

    /// Get key material ready for `recipient` ahead of the first message.
    ///
    /// The symmetric variant creates the pair key if it does not exist yet.
    /// The other variants have nothing to prepare.
    pub fn prepare_recipient(&self, recipient: &str) -> Result<()> {
        let recipient = recipient.trim();
        match self {
            Self::SymmetricAesPairwise(store) if !recipient.is_empty() => {
                store.key_for_peer(recipient).map(drop)
            },
            _ => Ok(()),
        }
    }

    /// Base64 export of the local public key (asymmetric only).
    pub fn public_key(&self) -> Option<&str> {
        match self {
            Self::AsymmetricRsa { identity, .. } => Some(identity.export_public()),
            _ => None,
        }
    }

    /// Register a peer public key (asymmetric only).
    pub fn register_peer(&self, username: &str, encoded_key: &str) -> Result<()> {
        match self {
            Self::AsymmetricRsa { registry, .. } => registry.register_peer(username, encoded_key),
            _ => Err(CryptoError::Unsupported("public key registration")),
        }
    }

    /// Forget every registered peer key (asymmetric only).
    pub fn clear_peers(&self) -> Result<()> {
        match self {
            Self::AsymmetricRsa { registry, .. } => registry.clear(),
            _ => Err(CryptoError::Unsupported("public key registration")),
        }
    }

    /// Registry file lines for display (asymmetric only).
    pub fn peer_lines(&self) -> Result<Vec<String>> {
        match self {
            Self::AsymmetricRsa { registry, .. } => registry.load_file_lines(),
            _ => Err(CryptoError::Unsupported("public key registration")),
        }
    }

    /// Session start hook: truncates the asymmetric registry file.
    pub fn on_session_start(&self) -> Result<()> {
        self.reset_transient_state()
    }

    /// Session end hook: truncates the asymmetric registry file.
    pub fn on_session_end(&self) -> Result<()> {
        self.reset_transient_state()
    }

    fn reset_transient_state(&self) -> Result<()> {
        match self {
            Self::AsymmetricRsa { registry, .. } => registry.reset_file(),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for EncryptionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncryptionStrategy").field(&self.kind()).finish()
    }
}
