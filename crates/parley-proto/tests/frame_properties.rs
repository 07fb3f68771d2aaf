//! Property-based tests for frame and envelope encoding
//!
//! These tests verify the framing invariants for ALL generated inputs, not
//! just specific examples.

use parley_proto::{Envelope, Frame, FrameFormat, FrameHeader, ProtocolError, Username};
use proptest::prelude::*;

/// Strategy for header widths wide enough for the generated payloads.
fn arbitrary_format() -> impl Strategy<Value = FrameFormat> {
    (4usize..=FrameHeader::MAX_WIDTH)
        .prop_map(|width| FrameFormat::new(width, FrameFormat::DEFAULT_MAX_PAYLOAD_SIZE).unwrap())
}

/// Strategy for usernames that satisfy the identity invariants.
fn arbitrary_username() -> impl Strategy<Value = Username> {
    "[a-zA-Z0-9_]{1,16}".prop_map(|name| Username::new(name).unwrap())
}

#[test]
fn prop_frame_encode_decode_roundtrip() {
    proptest!(|(format in arbitrary_format(), text in any::<String>())| {
        let frame = Frame::from_text(text.clone());

        let wire = frame.to_vec(&format).expect("encode should succeed");
        let decoded = Frame::decode(&wire, &format).expect("decode should succeed");

        // PROPERTY: Round-trip must be identity
        prop_assert_eq!(decoded.text(), text);
    });
}

#[test]
fn prop_header_declares_exact_payload_length() {
    proptest!(|(payload in prop::collection::vec(any::<u8>(), 0..4096))| {
        let format = FrameFormat::default();
        let wire = Frame::new(payload.clone()).to_vec(&format).unwrap();

        let header_text = std::str::from_utf8(&wire[..10]).expect("header is ASCII");
        let declared: usize = header_text.trim_end().parse().expect("header is decimal");

        // PROPERTY: First 10 bytes are the exact byte length of what follows
        prop_assert_eq!(declared, payload.len());
        prop_assert_eq!(wire.len(), 10 + payload.len());
        prop_assert!(header_text.starts_with(|c: char| c.is_ascii_digit()));
    });
}

#[test]
fn prop_decode_ignores_trailing_bytes() {
    proptest!(|(first in prop::collection::vec(any::<u8>(), 0..256), second in prop::collection::vec(any::<u8>(), 0..256))| {
        let format = FrameFormat::default();
        let mut wire = Frame::new(first.clone()).to_vec(&format).unwrap();
        wire.extend(Frame::new(second).to_vec(&format).unwrap());

        let decoded = Frame::decode(&wire, &format).unwrap();
        prop_assert_eq!(&decoded.payload[..], &first[..]);
    });
}

#[test]
fn prop_truncated_payload_is_rejected() {
    proptest!(|(payload in prop::collection::vec(any::<u8>(), 1..512), cut in any::<prop::sample::Index>())| {
        let format = FrameFormat::default();
        let wire = Frame::new(payload.clone()).to_vec(&format).unwrap();

        let keep = 10 + cut.index(payload.len());
        let result = Frame::decode(&wire[..keep], &format);

        let is_truncated = matches!(result, Err(ProtocolError::FrameTruncated { .. }));
        prop_assert!(is_truncated);
    });
}

#[test]
fn prop_envelope_split_recovers_sender() {
    proptest!(|(sender in arbitrary_username(), message in any::<String>())| {
        let wire = Envelope::new(&sender, message.clone()).encode();
        let parsed = Envelope::parse(&wire).expect("envelope has a separator");

        // PROPERTY: Sender never absorbs part of the message, even if the
        // message contains separators
        prop_assert_eq!(parsed.sender, sender.as_str());
        prop_assert_eq!(parsed.message, message);
    });
}

#[test]
fn prop_garbage_header_never_panics() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..64))| {
        let _ = Frame::decode(&bytes, &FrameFormat::default());
    });
}
