//! Parley key management and message encryption
//!
//! Key material and the per-message encryption policy for the two encrypted
//! client variants. Nothing here touches the network; the only I/O is the
//! small key files kept next to the client.
//!
//! # Variants
//!
//! ```text
//! AsymmetricRsa                         SymmetricAesPairwise
//! ─────────────                         ────────────────────
//! IdentityKeys (RSA-2048, in memory)    PairwiseKeyStore
//!        │                                     │
//! KeyStore: peer -> public key          key_<a>_<b>.key (16 bytes, on disk)
//!        │                                     │
//! PKCS#1 v1.5 encrypt / decrypt         AES-128-ECB + PKCS#7
//!        │                                     │
//!        └──────────── Base64 on the wire ─────┘
//! ```
//!
//! # Security
//!
//! These variants provide confidentiality against a passive relay only:
//! - No forward secrecy: RSA keys live for the session, AES pair keys forever
//! - No authentication: the sender field of an envelope is not verified
//! - No replay protection
//! - ECB leaks equality of plaintext blocks; kept for wire compatibility
//! - Key files are shared state with no locking between processes

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod asymmetric;
pub mod encoding;
mod error;
pub mod pairwise;
mod strategy;
pub mod symmetric;

pub use asymmetric::{IdentityKeys, KeyStore};
pub use error::{CryptoError, Result};
pub use pairwise::{PairwiseKeyStore, pair_file_name};
pub use strategy::{EncryptionStrategy, Inbound, StrategyKind};
pub use symmetric::PairKey;
