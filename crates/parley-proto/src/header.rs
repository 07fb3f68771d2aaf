//! Fixed-width ASCII length header.
//!
//! Every frame starts with the payload length written in decimal ASCII,
//! left-justified and padded with spaces to a fixed width (10 bytes by
//! default):
//!
//! ```text
//! "5         hello"
//!  ^^^^^^^^^^ header (10 bytes)
//!            ^^^^^ payload (5 bytes)
//! ```
//!
//! The header carries no magic number or version. A receiver that reads a
//! header which does not parse as a non-negative decimal integer has lost
//! synchronisation with the stream and must treat the connection as broken.

use crate::errors::{ProtocolError, Result};

/// Parsed length header.
///
/// # Invariants
///
/// - Encoded form is exactly `width` bytes of ASCII.
/// - Decimal digits are left-justified; padding is `0x20` only on encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    payload_size: u64,
}

impl FrameHeader {
    /// Header width used by the relay protocol.
    pub const DEFAULT_WIDTH: usize = 10;

    /// Widest header we accept. `u64::MAX` has 20 decimal digits.
    pub const MAX_WIDTH: usize = 20;

    /// Create a header declaring `payload_size` bytes.
    #[must_use]
    pub fn new(payload_size: u64) -> Self {
        Self { payload_size }
    }

    /// Declared payload length in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u64 {
        self.payload_size
    }

    /// Largest payload length representable in a header of `width` bytes.
    #[must_use]
    pub fn max_encodable(width: usize) -> u64 {
        u32::try_from(width)
            .ok()
            .and_then(|w| 10u64.checked_pow(w))
            .map_or(u64::MAX, |limit| limit - 1)
    }

    /// Serialize to exactly `width` ASCII bytes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnsupportedHeaderWidth` if `width` is 0 or above
    ///   [`Self::MAX_WIDTH`]
    /// - `ProtocolError::PayloadTooLarge` if the length needs more than
    ///   `width` digits
    pub fn to_bytes(&self, width: usize) -> Result<Vec<u8>> {
        check_width(width)?;

        let max = Self::max_encodable(width);
        if self.payload_size > max {
            return Err(ProtocolError::PayloadTooLarge { size: self.payload_size, max });
        }

        let encoded = format!("{:<width$}", self.payload_size);
        debug_assert_eq!(encoded.len(), width);

        Ok(encoded.into_bytes())
    }

    /// Parse the first `width` bytes of `bytes`.
    ///
    /// Surrounding whitespace and control bytes are ignored and a single
    /// leading `+` is accepted. Anything else that is not a decimal digit,
    /// including a minus sign, is rejected.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if fewer than `width` bytes are given
    /// - `ProtocolError::InvalidHeader` if the text is not a non-negative
    ///   decimal integer
    pub fn from_bytes(bytes: &[u8], width: usize) -> Result<Self> {
        check_width(width)?;

        let raw = bytes
            .get(..width)
            .ok_or(ProtocolError::FrameTooShort { expected: width, actual: bytes.len() })?;

        let invalid = || ProtocolError::InvalidHeader {
            header: String::from_utf8_lossy(raw).into_owned(),
        };

        let text = std::str::from_utf8(raw).map_err(|_| invalid())?;
        let trimmed = text.trim_matches(|c: char| c <= ' ');
        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let payload_size = digits.parse::<u64>().map_err(|_| invalid())?;

        Ok(Self { payload_size })
    }
}

fn check_width(width: usize) -> Result<()> {
    if width == 0 || width > FrameHeader::MAX_WIDTH {
        return Err(ProtocolError::UnsupportedHeaderWidth(width));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_left_justified_space_padded() {
        let bytes = FrameHeader::new(42).to_bytes(10).unwrap();
        assert_eq!(bytes, b"42        ");
    }

    #[test]
    fn encodes_zero_length() {
        let bytes = FrameHeader::new(0).to_bytes(10).unwrap();
        assert_eq!(bytes, b"0         ");
    }

    #[test]
    fn rejects_length_wider_than_header() {
        let result = FrameHeader::new(100).to_bytes(2);
        assert_eq!(result, Err(ProtocolError::PayloadTooLarge { size: 100, max: 99 }));
    }

    #[test]
    fn full_width_value_fits() {
        let bytes = FrameHeader::new(9_999_999_999).to_bytes(10).unwrap();
        assert_eq!(bytes, b"9999999999");
    }

    #[test]
    fn parses_padded_header() {
        let header = FrameHeader::from_bytes(b"17        trailing", 10).unwrap();
        assert_eq!(header.payload_size(), 17);
    }

    #[test]
    fn parses_right_aligned_and_signed_header() {
        assert_eq!(FrameHeader::from_bytes(b"        17", 10).unwrap().payload_size(), 17);
        assert_eq!(FrameHeader::from_bytes(b"+17       ", 10).unwrap().payload_size(), 17);
    }

    #[test]
    fn rejects_negative_length() {
        let result = FrameHeader::from_bytes(b"-5        ", 10);
        assert!(matches!(result, Err(ProtocolError::InvalidHeader { .. })));
    }

    #[test]
    fn rejects_non_numeric_and_blank_headers() {
        for raw in [&b"hello     "[..], b"          ", b"1 2       ", b"0x10      "] {
            let result = FrameHeader::from_bytes(raw, 10);
            assert!(
                matches!(result, Err(ProtocolError::InvalidHeader { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_short_buffer() {
        let result = FrameHeader::from_bytes(b"12", 10);
        assert_eq!(result, Err(ProtocolError::FrameTooShort { expected: 10, actual: 2 }));
    }

    #[test]
    fn rejects_unsupported_width() {
        assert_eq!(
            FrameHeader::new(1).to_bytes(0),
            Err(ProtocolError::UnsupportedHeaderWidth(0))
        );
        assert_eq!(
            FrameHeader::from_bytes(&[b'1'; 32], 21),
            Err(ProtocolError::UnsupportedHeaderWidth(21))
        );
    }

    #[test]
    fn max_encodable_saturates() {
        assert_eq!(FrameHeader::max_encodable(1), 9);
        assert_eq!(FrameHeader::max_encodable(10), 9_999_999_999);
        assert_eq!(FrameHeader::max_encodable(20), u64::MAX);
    }
}
