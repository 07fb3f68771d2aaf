//! Fuzz target for the inbound message path
//!
//! Arbitrary payloads run through the same steps the receive loop applies:
//! lossy UTF-8 decode, envelope split, plausibility test, and the decryption
//! policy of the plaintext strategy.
//!
//! # Invariants
//!
//! - Envelope split happens at the first `:` and loses no bytes
//! - The plausibility test agrees with a full Base64 decode
//! - Inbound text is shown unchanged when it is not decrypted
//! - NEVER panic

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_crypto::{EncryptionStrategy, encoding};
use parley_proto::Envelope;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    let Some(envelope) = Envelope::parse(&text) else {
        assert!(!text.contains(':'));
        return;
    };
    assert!(!envelope.sender.contains(':'));
    assert_eq!(format!("{}:{}", envelope.sender, envelope.message), text);

    let plausible = encoding::looks_like_ciphertext(&envelope.message);
    assert_eq!(plausible, encoding::decode(&envelope.message));

    let inbound = EncryptionStrategy::None.maybe_decrypt(&envelope.message, &envelope.sender);
    assert!(!inbound.encrypted);
    assert_eq!(inbound.text, envelope.message);
});
