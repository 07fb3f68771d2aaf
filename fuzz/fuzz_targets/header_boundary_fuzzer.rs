//! Fuzz target for length header boundary conditions
//!
//! # Strategy
//!
//! - Width: every supported width plus 0 and just-over-max
//! - Text: canonical, leading `+`, leading `-`, inner spaces, control bytes,
//!   non-ASCII digits, random bytes
//! - Length: zero, at the ceiling, just over, and values needing more digits
//!   than the width holds
//!
//! # Invariants
//!
//! - Canonical headers always parse back to the encoded length
//! - A parsed length above the ceiling MUST be `PayloadTooLarge`
//! - Negative lengths are never accepted
//! - Encoded headers are exactly `width` bytes
//! - NEVER panic

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_proto::{FrameFormat, FrameHeader, ProtocolError};

#[derive(Debug, Clone, Arbitrary)]
struct HeaderCase {
    width: u8,
    ceiling: u64,
    length: Length,
    text: HeaderText,
}

#[derive(Debug, Clone, Arbitrary)]
enum Length {
    Zero,
    Small(u16),
    AtCeiling,
    JustOverCeiling,
    MaxU64,
    Random(u64),
}

#[derive(Debug, Clone, Arbitrary)]
enum HeaderText {
    Canonical,
    PlusSign,
    MinusSign,
    InnerSpace,
    ControlPadding(u8),
    FullWidthDigit,
    Random(Vec<u8>),
}

fuzz_target!(|case: HeaderCase| {
    let width = usize::from(case.width % (FrameHeader::MAX_WIDTH as u8 + 2));
    let Ok(format) = FrameFormat::new(width, case.ceiling) else {
        assert!(width == 0 || width > FrameHeader::MAX_WIDTH);
        return;
    };

    let length = match case.length {
        Length::Zero => 0,
        Length::Small(n) => u64::from(n),
        Length::AtCeiling => format.max_payload_size(),
        Length::JustOverCeiling => format.max_payload_size().saturating_add(1),
        Length::MaxU64 => u64::MAX,
        Length::Random(n) => n,
    };

    let canonical = FrameHeader::new(length).to_bytes(width);
    if let Ok(bytes) = &canonical {
        assert_eq!(bytes.len(), width);
    }

    let mut raw = match case.text {
        HeaderText::Canonical => match canonical {
            Ok(bytes) => bytes,
            Err(_) => return,
        },
        HeaderText::PlusSign => format!("+{length}").into_bytes(),
        HeaderText::MinusSign => format!("-{length}").into_bytes(),
        HeaderText::InnerSpace => {
            let digits = length.to_string();
            let (head, tail) = digits.split_at(digits.len() / 2);
            format!("{head} {tail}").into_bytes()
        },
        HeaderText::ControlPadding(byte) => {
            let mut bytes = vec![byte % 0x20];
            bytes.extend_from_slice(length.to_string().as_bytes());
            bytes
        },
        HeaderText::FullWidthDigit => "１".repeat(width).into_bytes(),
        HeaderText::Random(bytes) => bytes,
    };
    raw.resize(width.max(raw.len()), b' ');

    match format.parse_header(&raw) {
        Ok(header) => {
            assert!(header.payload_size() <= format.max_payload_size());
            assert!(!String::from_utf8_lossy(&raw[..width]).trim().starts_with('-'));
        },
        Err(ProtocolError::PayloadTooLarge { size, max }) => assert!(size > max),
        Err(_) => {},
    }
});
