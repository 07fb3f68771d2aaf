//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding the wire format.
///
/// Every variant except the username checks is a protocol violation: the
/// connection that produced it is no longer in a known state and the session
/// must terminate rather than retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Length header is not a non-negative decimal integer.
    #[error("invalid length header: {header:?}")]
    InvalidHeader {
        /// Header text as received (lossy UTF-8)
        header: String,
    },

    /// Buffer is shorter than the fixed-width length header.
    #[error("frame too short: expected {expected} header bytes, got {actual}")]
    FrameTooShort {
        /// Header width in bytes
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Header was valid but fewer payload bytes followed than it declared.
    #[error("frame truncated: expected {expected} payload bytes, got {actual}")]
    FrameTruncated {
        /// Declared payload length
        expected: usize,
        /// Payload bytes available
        actual: usize,
    },

    /// Payload exceeds the configured ceiling or does not fit the header.
    #[error("payload too large: {size} bytes exceeds limit {max}")]
    PayloadTooLarge {
        /// Payload size in bytes
        size: u64,
        /// Maximum accepted size in bytes
        max: u64,
    },

    /// Header width outside the supported range.
    #[error("unsupported header width: {0}")]
    UnsupportedHeaderWidth(usize),

    /// Username is empty after trimming whitespace.
    #[error("username must not be empty")]
    EmptyUsername,

    /// Username contains the envelope separator.
    #[error("username {0:?} must not contain ':'")]
    InvalidUsername(String),
}

impl ProtocolError {
    /// Returns true if this error came from bytes received on the wire.
    ///
    /// Wire errors terminate the session. The remaining variants are caught
    /// before anything is sent and can be corrected by the user.
    pub fn is_wire_violation(&self) -> bool {
        match self {
            Self::InvalidHeader { .. }
            | Self::FrameTooShort { .. }
            | Self::FrameTruncated { .. }
            | Self::PayloadTooLarge { .. } => true,

            Self::UnsupportedHeaderWidth(_) | Self::EmptyUsername | Self::InvalidUsername(_) => {
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_header_display() {
        let err = ProtocolError::InvalidHeader { header: "abc       ".to_string() };
        assert_eq!(err.to_string(), "invalid length header: \"abc       \"");
    }

    #[test]
    fn wire_violations_are_classified() {
        assert!(ProtocolError::PayloadTooLarge { size: 20, max: 10 }.is_wire_violation());
        assert!(ProtocolError::FrameTruncated { expected: 5, actual: 1 }.is_wire_violation());
        assert!(!ProtocolError::EmptyUsername.is_wire_violation());
        assert!(!ProtocolError::InvalidUsername("a:b".to_string()).is_wire_violation());
    }
}
