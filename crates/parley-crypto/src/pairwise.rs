//! File-backed store of pairwise AES keys.
//!
//! There is no network key exchange in the symmetric variant. Both users run
//! the client against the same file system, and whichever of them first
//! encrypts (or decrypts) for the pair creates `key_<a>_<b>.key`, where the
//! two usernames are ordered so that either side derives the same name.
//! The file is the memo: every lookup reads it, so a key created by another
//! process is picked up immediately.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use parley_proto::Username;

use crate::{
    error::{CryptoError, Result},
    symmetric::PairKey,
};

/// Deterministic, order-independent key file name for a pair of users.
///
/// Names are compared byte-wise, so `pair_file_name("bob", "alice")` and
/// `pair_file_name("alice", "bob")` both yield `key_alice_bob.key`.
pub fn pair_file_name(a: &str, b: &str) -> String {
    let (first, second) = if a < b { (a, b) } else { (b, a) };
    format!("key_{first}_{second}.key")
}

/// Pairwise key store for one local user.
#[derive(Debug, Clone)]
pub struct PairwiseKeyStore {
    local: Username,
    dir: PathBuf,
}

impl PairwiseKeyStore {
    /// Create a store for `local` with key files under `dir`.
    pub fn new(local: Username, dir: impl Into<PathBuf>) -> Self {
        Self { local, dir: dir.into() }
    }

    /// The local user every pair includes.
    pub fn local(&self) -> &Username {
        &self.local
    }

    /// Path of the key file shared by `a` and `b`.
    pub fn pair_path(&self, a: &str, b: &str) -> PathBuf {
        self.dir.join(pair_file_name(a, b))
    }

    /// True if a key already exists for `a` and `b`. Never creates one.
    pub fn has_key_for_pair(&self, a: &str, b: &str) -> bool {
        self.pair_path(a, b).is_file()
    }

    /// Load the key for `a` and `b`, generating and persisting it first if
    /// none exists yet.
    ///
    /// The key is written to a scratch file in the same directory and then
    /// linked into place without replacing an existing file. If another
    /// writer publishes first, its key is read back instead. A failed write
    /// leaves nothing behind under the pair's name.
    ///
    /// # Errors
    ///
    /// - `Io` if the file cannot be read or created
    /// - `InvalidKeyLength` if an existing file does not hold 16 bytes
    pub fn key_for_pair(&self, a: &str, b: &str) -> Result<PairKey> {
        let path = self.pair_path(a, b);

        match read_key(&path)? {
            Some(key) => Ok(key),
            None => create_key(&path),
        }
    }

    /// Key shared between the local user and `peer`.
    pub fn key_for_peer(&self, peer: &str) -> Result<PairKey> {
        self.key_for_pair(self.local.as_str(), peer)
    }

    /// Existing key shared with `peer`, without creating one.
    pub fn existing_key_for_peer(&self, peer: &str) -> Result<Option<PairKey>> {
        read_key(&self.pair_path(self.local.as_str(), peer))
    }
}

fn read_key(path: &Path) -> Result<Option<PairKey>> {
    match fs::read(path) {
        Ok(bytes) => PairKey::from_slice(&bytes).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CryptoError::io(path, e)),
    }
}

fn create_key(path: &Path) -> Result<PairKey> {
    let key = PairKey::generate();
    let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));

    // The key is written in full to a scratch file first, so the real name
    // only ever appears with all 16 bytes behind it
    let mut scratch = tempfile::Builder::new()
        .prefix(".key_")
        .tempfile_in(dir)
        .map_err(|e| CryptoError::io(dir, e))?;
    scratch.write_all(key.as_bytes()).map_err(|e| CryptoError::io(scratch.path(), e))?;
    scratch.as_file().sync_all().map_err(|e| CryptoError::io(scratch.path(), e))?;

    match scratch.persist_noclobber(path) {
        Ok(_) => {
            tracing::info!(path = %path.display(), "generated new pair key");
            Ok(key)
        },
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
            tracing::debug!(path = %path.display(), "pair key created concurrently, reading back");
            read_key(path)?.ok_or_else(|| CryptoError::io(path, e.error))
        },
        Err(e) => Err(CryptoError::io(path, e.error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path, local: &str) -> PairwiseKeyStore {
        PairwiseKeyStore::new(Username::new(local).unwrap(), dir)
    }

    #[test]
    fn file_name_is_order_independent() {
        assert_eq!(pair_file_name("alice", "bob"), "key_alice_bob.key");
        assert_eq!(pair_file_name("bob", "alice"), "key_alice_bob.key");
        assert_eq!(pair_file_name("carol", "alice"), "key_alice_carol.key");
    }

    #[test]
    fn file_name_for_same_user() {
        assert_eq!(pair_file_name("eve", "eve"), "key_eve_eve.key");
    }

    #[test]
    fn both_orders_resolve_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), "alice");

        let first = store.key_for_pair("alice", "bob").unwrap();
        let second = store.key_for_pair("bob", "alice").unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn key_is_persisted_on_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), "alice");

        assert!(!store.has_key_for_pair("alice", "carol"));
        let key = store.key_for_peer("carol").unwrap();
        assert!(store.has_key_for_pair("carol", "alice"));

        let on_disk = fs::read(dir.path().join("key_alice_carol.key")).unwrap();
        assert_eq!(on_disk.len(), 16);
        assert_eq!(&on_disk[..], key.as_bytes());
    }

    #[test]
    fn peers_sharing_a_directory_share_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let alice = store(dir.path(), "alice");
        let bob = store(dir.path(), "bob");

        let ciphertext = alice.key_for_peer("bob").unwrap().encrypt(b"hi bob");
        let key = bob.existing_key_for_peer("alice").unwrap().unwrap();

        assert_eq!(key.decrypt(&ciphertext).unwrap(), b"hi bob");
    }

    #[test]
    fn existing_key_lookup_does_not_create() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), "alice");

        assert!(store.existing_key_for_peer("bob").unwrap().is_none());
        assert!(!store.has_key_for_pair("alice", "bob"));
    }

    #[test]
    fn corrupt_key_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), "alice");
        fs::write(store.pair_path("alice", "bob"), b"short").unwrap();

        let result = store.key_for_peer("bob");
        assert!(matches!(result, Err(CryptoError::InvalidKeyLength { actual: 5, .. })));
    }

    #[test]
    fn creation_leaves_only_the_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), "alice");

        store.key_for_peer("carol").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["key_alice_carol.key".to_string()]);
    }

    #[test]
    fn publishing_never_replaces_an_existing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), "alice");
        let existing = store.key_for_peer("bob").unwrap();

        let again = create_key(&store.pair_path("alice", "bob")).unwrap();

        assert_eq!(again, existing);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn concurrent_first_use_never_sees_a_partial_key() {
        let dir = tempfile::tempdir().unwrap();

        let keys: Vec<PairKey> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|i| {
                    let store = store(dir.path(), if i % 2 == 0 { "alice" } else { "carol" });
                    scope.spawn(move || store.key_for_pair("alice", "carol").unwrap())
                })
                .collect();
            workers.into_iter().map(|worker| worker.join().unwrap()).collect()
        });

        assert!(keys.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn unwritable_directory_leaves_no_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let store = store(&missing, "alice");

        assert!(matches!(store.key_for_peer("bob"), Err(CryptoError::Io { .. })));
        assert!(!store.has_key_for_pair("alice", "bob"));
    }
}
