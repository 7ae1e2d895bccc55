//! Map of feed id to the private key material that produces into it.
//!
//! Feeds we only consume have no entry here; [`FeedManager`](crate::manager::FeedManager)
//! uses presence/absence of a key to decide, at startup, whether a feed
//! needs a next-packet/blob-pointer DMX entry (consumer-only) or just a
//! want-dmx entry (we already hold everything we'd ever be asked for).

use std::{collections::HashMap, sync::Mutex};

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tinyssb_codec::constants::FID_SIZE;

/// Read-mostly store of `fid -> 32-byte Ed25519 seed`.
#[derive(Default)]
pub struct KeyStore {
    keys: Mutex<HashMap<[u8; FID_SIZE], [u8; 32]>>,
}

impl KeyStore {
    /// An empty key store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the private key for `fid`.
    pub fn insert(&self, fid: [u8; FID_SIZE], seed: [u8; 32]) {
        self.keys.lock().expect("keystore lock poisoned").insert(fid, seed);
    }

    /// The private key for `fid`, if we hold it.
    #[must_use]
    pub fn get(&self, fid: &[u8; FID_SIZE]) -> Option<[u8; 32]> {
        self.keys.lock().expect("keystore lock poisoned").get(fid).copied()
    }

    /// Whether we produce into `fid` (hold its private key).
    #[must_use]
    pub fn has_key(&self, fid: &[u8; FID_SIZE]) -> bool {
        self.keys.lock().expect("keystore lock poisoned").contains_key(fid)
    }

    /// Generate a fresh Ed25519 key pair, store the private key, and
    /// return the new feed id.
    pub fn generate_and_store(&self) -> [u8; FID_SIZE] {
        let signing_key = SigningKey::generate(&mut OsRng);
        let fid = signing_key.verifying_key().to_bytes();
        self.insert(fid, signing_key.to_bytes());
        fid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_is_recorded() {
        let store = KeyStore::new();
        let fid = store.generate_and_store();
        assert!(store.has_key(&fid));
        assert!(store.get(&fid).is_some());
    }

    #[test]
    fn unknown_fid_has_no_key() {
        let store = KeyStore::new();
        assert!(!store.has_key(&[0u8; 32]));
    }
}
