//! Session error types.

use std::{io, time::Duration};

use parley_crypto::CryptoError;
use parley_proto::ProtocolError;
use thiserror::Error;

use crate::{session::SessionState, transport::TransportError};

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors raised while setting up or driving a chat session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Client configuration was rejected
    #[error("invalid configuration: {reason}")]
    Config {
        /// What was wrong with it
        reason: String,
    },

    /// TCP connection to the relay failed
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Relay address that was dialed
        addr: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Relay did not accept the connection in time
    #[error("connecting to {addr} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Relay address that was dialed
        addr: String,
        /// Configured connect timeout
        timeout: Duration,
    },

    /// Framing or I/O failure on the connection
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Key management or encryption failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Invalid username or other protocol-level value
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Operation needs a streaming session
    #[error("session is {0}, not streaming")]
    NotStreaming(SessionState),
}

impl SessionError {
    /// Returns true if this error ends the session.
    ///
    /// Transport failures are fatal; everything else is scoped to the one
    /// operation that raised it.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::ConnectTimeout { .. } | Self::Transport(_) => true,
            Self::Config { .. } | Self::Crypto(_) | Self::Protocol(_) | Self::NotStreaming(_) => {
                false
            },
        }
    }
}
