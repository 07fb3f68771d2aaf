//! Behavioural tests for the encryption policy across variants.
//!
//! RSA key generation is expensive, so tests that only need a key pair to
//! encrypt for share one identity per test binary.

use std::{path::Path, sync::OnceLock};

use parley_crypto::{
    CryptoError, EncryptionStrategy, IdentityKeys, Inbound, KeyStore, StrategyKind,
    asymmetric, encoding,
};
use parley_proto::Username;
use proptest::prelude::*;

fn username(name: &str) -> Username {
    Username::new(name).unwrap()
}

/// A key pair unrelated to any strategy under test, generated once.
fn shared_identity() -> &'static IdentityKeys {
    static SHARED: OnceLock<IdentityKeys> = OnceLock::new();
    SHARED.get_or_init(|| IdentityKeys::generate().unwrap())
}

/// Fresh asymmetric strategy for bob.
fn bob_strategy(dir: &Path) -> EncryptionStrategy {
    EncryptionStrategy::AsymmetricRsa {
        identity: IdentityKeys::generate().unwrap(),
        registry: KeyStore::new(&username("bob"), dir),
    }
}

#[test]
fn asymmetric_round_trip_with_fresh_key_pair() {
    let keys = shared_identity();

    proptest!(ProptestConfig::with_cases(16), |(message in "\\PC{0,60}")| {
        let ciphertext = asymmetric::encrypt_for(keys.public_key(), message.as_bytes()).unwrap();
        let plaintext = keys.decrypt(&ciphertext).unwrap();

        // PROPERTY: decrypt(private, encrypt(public, m)) == m
        prop_assert_eq!(String::from_utf8(plaintext).unwrap(), message);
    });
}

#[test]
fn alice_encrypts_for_bob_and_bob_decrypts() {
    let dir = tempfile::tempdir().unwrap();

    let bob = bob_strategy(dir.path());
    let alice =
        EncryptionStrategy::new(StrategyKind::AsymmetricRsa, &username("alice"), dir.path())
            .unwrap();

    let bob_public = bob.public_key().unwrap().to_string();
    alice.register_peer("bob", &bob_public).unwrap();

    let wire = alice.maybe_encrypt("hi", "bob", true).unwrap();
    assert!(encoding::looks_like_ciphertext(&wire).is_some());
    assert_ne!(wire, "hi");

    let inbound = bob.maybe_decrypt(&wire, "alice");
    assert_eq!(inbound, Inbound { text: "hi".to_string(), encrypted: true });
}

#[test]
fn unknown_recipient_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let bob = bob_strategy(dir.path());

    let result = bob.maybe_encrypt("hi", "mallory", true);
    assert!(
        matches!(result, Err(CryptoError::UnknownRecipient { ref username }) if username == "mallory")
    );
}

#[test]
fn ciphertext_for_someone_else_is_shown_as_received() {
    let dir = tempfile::tempdir().unwrap();
    let bob = bob_strategy(dir.path());

    // Encrypted for a key pair bob does not hold
    let ciphertext = asymmetric::encrypt_for(shared_identity().public_key(), b"secret").unwrap();
    let wire = encoding::encode(&ciphertext);

    assert_eq!(bob.maybe_decrypt(&wire, "alice"), Inbound { text: wire.clone(), encrypted: false });
}

#[test]
fn plausible_plaintext_falls_back_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let bob = bob_strategy(dir.path());

    for text in ["aGVsbG8=", "test", "abcd"] {
        let inbound = bob.maybe_decrypt(text, "alice");
        assert_eq!(inbound, Inbound { text: text.to_string(), encrypted: false });
    }
}

#[test]
fn implausible_text_never_reaches_decryption() {
    let dir = tempfile::tempdir().unwrap();
    let aes =
        EncryptionStrategy::new(StrategyKind::SymmetricAesPairwise, &username("bob"), dir.path())
            .unwrap();

    proptest!(|(text in "[^A-Za-z0-9+/=]{1,3}[ -~]{0,20}")| {
        let inbound = aes.maybe_decrypt(&text, "alice");
        prop_assert_eq!(inbound, Inbound { text: text.clone(), encrypted: false });
    });

    // Not even a lookup that could create a key file
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn session_hooks_truncate_registry_file() {
    let dir = tempfile::tempdir().unwrap();
    let bob = bob_strategy(dir.path());
    bob.register_peer("carol", shared_identity().export_public()).unwrap();
    assert_eq!(bob.peer_lines().unwrap().len(), 1);

    bob.on_session_end().unwrap();
    assert!(bob.peer_lines().unwrap().is_empty());

    // Memory survives a file reset, so encryption still works
    assert!(bob.maybe_encrypt("hi", "carol", true).is_ok());

    bob.clear_peers().unwrap();
    assert!(matches!(
        bob.maybe_encrypt("hi", "carol", true),
        Err(CryptoError::UnknownRecipient { .. })
    ));
}
