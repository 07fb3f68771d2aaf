//! Base64 transport encoding and the ciphertext plausibility test.
//!
//! The wire format has no flag marking a message as encrypted. Receivers
//! instead try to Base64-decode every message and only attempt decryption if
//! that succeeds. The decoder is deliberately permissive (padding optional,
//! non-zero trailing bits accepted) so that it agrees with the clients this
//! protocol was first deployed with.
//!
//! This is a heuristic: plaintext such as `"aGVsbG8="` or `"test"` is valid
//! Base64 and will be routed through decryption, which then fails and the
//! text is shown unchanged.

use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};

/// Standard alphabet, padded on encode, lenient on decode.
pub const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encode ciphertext for the wire.
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode wire text, `None` if it is not Base64.
#[must_use]
pub fn decode(text: &str) -> Option<Vec<u8>> {
    BASE64.decode(text).ok()
}

/// Plausibility test: returns the decoded bytes if `text` could be
/// ciphertext.
#[must_use]
pub fn looks_like_ciphertext(text: &str) -> Option<Vec<u8>> {
    decode(text)
}
