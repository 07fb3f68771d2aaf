//! Fuzz target for Frame::decode
//!
//! Arbitrary bytes against the default 10-byte header looking for:
//! - Parser panics
//! - Overflow when adding the header width to the declared length
//! - Payload slices past the end of the input
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_proto::{Frame, FrameFormat};

fuzz_target!(|data: &[u8]| {
    let format = FrameFormat::default();

    if let Ok(frame) = Frame::decode(data, &format) {
        // A decoded frame never claims more bytes than were supplied
        assert!(frame.encoded_len(&format) <= data.len());
        assert!(frame.payload.len() as u64 <= format.max_payload_size());
    }
});
