//! Commands into a session and events out of it.
//!
//! This is the boundary a front end talks to: it submits
//! [`SessionCommand`]s and renders each [`SessionEvent`] as one output line.

use std::fmt;

use parley_crypto::Inbound;

/// Marker placed before text that was successfully decrypted.
pub const ENCRYPTED_MARKER: &str = "[Зашифровано]";

/// User actions a front end can submit to a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Send a chat message, optionally encrypted for `recipient`
    Send {
        /// Message text
        text: String,
        /// Recipient hint used to pick key material
        recipient: String,
        /// Encrypt this message
        encrypt: bool,
    },
    /// Register a peer's exported public key
    RegisterPeer {
        /// Peer username
        username: String,
        /// Base64 X.509 public key
        public_key: String,
    },
    /// Forget every registered public key
    ClearPeers,
    /// Show the registered public keys
    ListPeers,
    /// Show the local public key
    ShowPublicKey,
    /// Make sure key material exists for `recipient`
    PrepareRecipient {
        /// Recipient about to be messaged
        recipient: String,
    },
    /// End the session
    Exit,
}

/// Output produced by a session, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Chat message received from another user
    Message {
        /// Sender field of the envelope
        sender: String,
        /// Text to display
        text: String,
        /// True if `text` was decrypted
        encrypted: bool,
    },
    /// Local copy of a message this session sent
    Echo {
        /// Local username
        sender: String,
        /// Text as typed, before encryption
        text: String,
    },
    /// Informational line
    Notice(String),
    /// Per-operation or connection error
    Error(String),
    /// Session reached its terminal state
    Closed,
}

impl SessionEvent {
    /// Build a `Message` from the decryption policy's output.
    pub fn received(sender: impl Into<String>, inbound: Inbound) -> Self {
        Self::Message { sender: sender.into(), text: inbound.text, encrypted: inbound.encrypted }
    }

    /// True for the final event of a session.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message { sender, text, encrypted: true } => {
                write!(f, "{sender} > {ENCRYPTED_MARKER} > {text}")
            },
            Self::Message { sender, text, encrypted: false } | Self::Echo { sender, text } => {
                write!(f, "{sender} > {text}")
            },
            Self::Notice(line) | Self::Error(line) => f.write_str(line),
            Self::Closed => f.write_str("Соединение закрыто"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypted_message_carries_marker() {
        let event = SessionEvent::received("alice", Inbound { text: "hi".into(), encrypted: true });
        assert_eq!(event.to_string(), "alice > [Зашифровано] > hi");
    }

    #[test]
    fn plain_message_and_echo_render_alike() {
        let message =
            SessionEvent::Message { sender: "bob".into(), text: "a:b".into(), encrypted: false };
        let echo = SessionEvent::Echo { sender: "bob".into(), text: "a:b".into() };

        assert_eq!(message.to_string(), "bob > a:b");
        assert_eq!(echo.to_string(), message.to_string());
    }

    #[test]
    fn notices_render_verbatim() {
        assert_eq!(SessionEvent::Error("Ошибка: x".into()).to_string(), "Ошибка: x");
        assert!(SessionEvent::Closed.is_closed());
    }
}
