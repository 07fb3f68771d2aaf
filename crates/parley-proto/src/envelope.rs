//! Chat envelopes and identity announcements.
//!
//! After the first frame of a connection, every frame payload is an envelope
//! of the form `sender:message`. The message may itself contain `:`, so the
//! split happens on the first separator only.
//!
//! The first frame a client sends is its bare username. Because it has no
//! separator, peers that receive it through the relay discard it as a control
//! frame; the relay uses it to attribute the connection.

use std::fmt;

use crate::{
    Frame,
    errors::{ProtocolError, Result},
};

/// Separator between sender and message in an envelope.
pub const ENVELOPE_SEPARATOR: char = ':';

/// A validated chat identity.
///
/// # Invariants
///
/// - Non-empty after trimming surrounding whitespace (the stored form is the
///   trimmed one).
/// - Contains no [`ENVELOPE_SEPARATOR`], so it round-trips through an
///   envelope unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Username(String);

impl Username {
    /// Validate and wrap a username.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::EmptyUsername` if nothing remains after trimming
    /// - `ProtocolError::InvalidUsername` if the name contains `:`
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let trimmed = name.as_ref().trim();

        if trimmed.is_empty() {
            return Err(ProtocolError::EmptyUsername);
        }
        if trimmed.contains(ENVELOPE_SEPARATOR) {
            return Err(ProtocolError::InvalidUsername(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// The username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity announcement frame: the bare username, no separator.
    #[must_use]
    pub fn announcement(&self) -> Frame {
        Frame::from_text(self.0.clone())
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Logical content of a chat frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Sender as written on the wire
    pub sender: String,
    /// Message text, plaintext or Base64 ciphertext
    pub message: String,
}

impl Envelope {
    /// Create an envelope from the local identity.
    #[must_use]
    pub fn new(sender: &Username, message: impl Into<String>) -> Self {
        Self { sender: sender.as_str().to_string(), message: message.into() }
    }

    /// Split received text on the first separator.
    ///
    /// Returns `None` for control frames (no separator), which receivers
    /// discard.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let (sender, message) = text.split_once(ENVELOPE_SEPARATOR)?;
        Some(Self { sender: sender.to_string(), message: message.to_string() })
    }

    /// Wire text: `sender:message`.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}{ENVELOPE_SEPARATOR}{}", self.sender, self.message)
    }

    /// Wrap into a frame.
    #[must_use]
    pub fn into_frame(self) -> Frame {
        Frame::from_text(self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_separator_only() {
        let envelope = Envelope::parse("alice:hello:world").unwrap();
        assert_eq!(envelope.sender, "alice");
        assert_eq!(envelope.message, "hello:world");
    }

    #[test]
    fn frame_without_separator_is_control() {
        assert_eq!(Envelope::parse("bob"), None);
    }

    #[test]
    fn empty_parts_are_preserved() {
        let envelope = Envelope::parse(":").unwrap();
        assert_eq!(envelope.sender, "");
        assert_eq!(envelope.message, "");
    }

    #[test]
    fn encode_matches_wire_format() {
        let alice = Username::new("alice").unwrap();
        let envelope = Envelope::new(&alice, "a:b");
        assert_eq!(envelope.encode(), "alice:a:b");
        assert_eq!(Envelope::parse(&envelope.encode()), Some(envelope));
    }

    #[test]
    fn username_is_trimmed() {
        let name = Username::new("  carol \t").unwrap();
        assert_eq!(name.as_str(), "carol");
    }

    #[test]
    fn username_rejects_blank_and_separator() {
        assert_eq!(Username::new("   "), Err(ProtocolError::EmptyUsername));
        assert_eq!(Username::new("a:b"), Err(ProtocolError::InvalidUsername("a:b".to_string())));
    }

    #[test]
    fn announcement_is_bare_username() {
        let name = Username::new("dave").unwrap();
        let frame = name.announcement();
        assert_eq!(frame.text(), "dave");
        assert_eq!(Envelope::parse(&frame.text()), None);
    }
}
