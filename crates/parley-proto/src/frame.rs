//! Frame type combining length header and payload.
//!
//! A `Frame` is the unit exchanged with the relay:
//! - fixed-width ASCII decimal length header (see [`FrameHeader`])
//! - exactly that many payload bytes, UTF-8 text by convention
//!
//! [`FrameFormat`] carries the two knobs both ends must agree on: the header
//! width and the largest payload a receiver is willing to buffer.

use std::borrow::Cow;

use bytes::{BufMut, Bytes};

use crate::{
    FrameHeader,
    errors::{ProtocolError, Result},
};

/// Framing parameters shared by encoder and decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    header_width: usize,
    max_payload_size: u64,
}

impl FrameFormat {
    /// Receive-side ceiling applied unless configured otherwise (16 MB).
    pub const DEFAULT_MAX_PAYLOAD_SIZE: u64 = 16 * 1024 * 1024;

    /// Create a format with the given header width and payload ceiling.
    ///
    /// The ceiling is clamped to what the header width can express.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnsupportedHeaderWidth` if `header_width` is 0 or
    ///   above [`FrameHeader::MAX_WIDTH`]
    pub fn new(header_width: usize, max_payload_size: u64) -> Result<Self> {
        if header_width == 0 || header_width > FrameHeader::MAX_WIDTH {
            return Err(ProtocolError::UnsupportedHeaderWidth(header_width));
        }

        let max_payload_size = max_payload_size.min(FrameHeader::max_encodable(header_width));
        Ok(Self { header_width, max_payload_size })
    }

    /// Header width in bytes.
    #[must_use]
    pub fn header_width(&self) -> usize {
        self.header_width
    }

    /// Largest payload accepted or produced under this format.
    #[must_use]
    pub fn max_payload_size(&self) -> u64 {
        self.max_payload_size
    }

    /// Parse a header and enforce the payload ceiling.
    ///
    /// This is the check that must run before a receiver allocates the
    /// payload buffer.
    pub fn parse_header(&self, bytes: &[u8]) -> Result<FrameHeader> {
        let header = FrameHeader::from_bytes(bytes, self.header_width)?;

        if header.payload_size() > self.max_payload_size {
            return Err(ProtocolError::PayloadTooLarge {
                size: header.payload_size(),
                max: self.max_payload_size,
            });
        }

        Ok(header)
    }
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self {
            header_width: FrameHeader::DEFAULT_WIDTH,
            max_payload_size: Self::DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

/// Complete protocol frame.
///
/// Layout on the wire:
/// `[length: header_width ASCII bytes] + [payload: length bytes]`
///
/// # Invariants
///
/// - The header is derived from `payload.len()` at encode time, so a frame
///   can never be written with a mismatched length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw payload bytes
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame around raw payload bytes.
    #[must_use]
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self { payload: payload.into() }
    }

    /// Create a frame carrying UTF-8 text.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { payload: Bytes::from(text.into()) }
    }

    /// Header describing this frame's payload.
    #[must_use]
    pub fn header(&self) -> FrameHeader {
        FrameHeader::new(self.payload.len() as u64)
    }

    /// Payload decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Encode frame into buffer.
    ///
    /// Writes: `[header (width bytes)] + [payload (variable)]`
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if the payload exceeds the format's
    ///   ceiling or does not fit in the header
    pub fn encode(&self, format: &FrameFormat, dst: &mut impl BufMut) -> Result<()> {
        let size = self.payload.len() as u64;
        if size > format.max_payload_size() {
            return Err(ProtocolError::PayloadTooLarge { size, max: format.max_payload_size() });
        }

        let header = self.header().to_bytes(format.header_width())?;
        dst.put_slice(&header);
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Encode frame into a freshly allocated buffer.
    pub fn to_vec(&self, format: &FrameFormat) -> Result<Vec<u8>> {
        let mut wire = Vec::with_capacity(format.header_width() + self.payload.len());
        self.encode(format, &mut wire)?;
        Ok(wire)
    }

    /// Decode one frame from the front of `bytes`.
    ///
    /// Trailing bytes after the payload are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if the header is incomplete
    /// - `ProtocolError::InvalidHeader` if the header is not a decimal length
    /// - `ProtocolError::PayloadTooLarge` if the declared length exceeds the
    ///   format's ceiling
    /// - `ProtocolError::FrameTruncated` if the payload is incomplete
    pub fn decode(bytes: &[u8], format: &FrameFormat) -> Result<Self> {
        let header = format.parse_header(bytes)?;

        // INVARIANT: payload_size <= max_payload_size, which the caller chose to
        // be addressable; saturate rather than wrap on 32-bit targets.
        let payload_size = usize::try_from(header.payload_size()).unwrap_or(usize::MAX);
        let start = format.header_width();
        let available = bytes.len().saturating_sub(start);

        let payload = start
            .checked_add(payload_size)
            .and_then(|end| bytes.get(start..end))
            .ok_or(ProtocolError::FrameTruncated { expected: payload_size, actual: available })?;

        Ok(Self { payload: Bytes::copy_from_slice(payload) })
    }

    /// Total encoded length under `format`.
    #[must_use]
    pub fn encoded_len(&self, format: &FrameFormat) -> usize {
        format.header_width() + self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn frame_round_trip(payload in prop::collection::vec(any::<u8>(), 0..2048)) {
            let format = FrameFormat::default();
            let frame = Frame::new(payload);

            let wire = frame.to_vec(&format).expect("should encode");
            let parsed = Frame::decode(&wire, &format).expect("should decode");

            prop_assert_eq!(frame, parsed);
        }
    }

    #[test]
    fn frame_with_text_payload() {
        let format = FrameFormat::default();
        let frame = Frame::from_text("alice:hello");

        let wire = frame.to_vec(&format).unwrap();
        assert_eq!(&wire[..], b"11        alice:hello");
        assert_eq!(frame.encoded_len(&format), wire.len());

        let parsed = Frame::decode(&wire, &format).unwrap();
        assert_eq!(parsed.text(), "alice:hello");
    }

    #[test]
    fn multibyte_length_counts_bytes() {
        let format = FrameFormat::default();
        let frame = Frame::from_text("привет");

        let wire = frame.to_vec(&format).unwrap();
        assert_eq!(&wire[..10], b"12        ");
    }

    #[test]
    fn reject_truncated_frame() {
        let format = FrameFormat::default();
        let result = Frame::decode(b"100       abc", &format);
        assert_eq!(result, Err(ProtocolError::FrameTruncated { expected: 100, actual: 3 }));
    }

    #[test]
    fn reject_oversized_declared_payload() {
        let format = FrameFormat::new(10, 64).unwrap();
        let result = Frame::decode(b"65        ", &format);
        assert_eq!(result, Err(ProtocolError::PayloadTooLarge { size: 65, max: 64 }));
    }

    #[test]
    fn reject_oversized_outgoing_payload() {
        let format = FrameFormat::new(10, 4).unwrap();
        let result = Frame::from_text("hello").to_vec(&format);
        assert_eq!(result, Err(ProtocolError::PayloadTooLarge { size: 5, max: 4 }));
    }

    #[test]
    fn ceiling_clamped_to_header_width() {
        let format = FrameFormat::new(2, 1_000).unwrap();
        assert_eq!(format.max_payload_size(), 99);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let frame = Frame::new(vec![b'h', 0xff, b'i']);
        assert_eq!(frame.text(), "h\u{fffd}i");
    }
}
