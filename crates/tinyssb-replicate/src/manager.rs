//! The feed manager: owns the feed directory, the DMX table, the key
//! store, and per-feed callbacks, and drives replication by handling
//! incoming wants, packets, and blobs.
//!
//! Two locks guard shared state ([`DmxTable`] internally, and the callback
//! registry here); either may be held independently but never both at
//! once, so a callback invoked after a packet is appended never blocks a
//! concurrent DMX lookup.

use std::{
    collections::HashMap,
    sync::Mutex,
};

use tinyssb_codec::{
    constants::{FID_SIZE, MID_SIZE},
    signer::{Ed25519Signer, Ed25519Verifier, Signer},
    PacketType,
};
use tinyssb_feed::{packet, BlobFrame, Feed, FeedStore, Want, WirePacket};

use crate::{
    dmx::{DmxEntry, DmxTable},
    error::ReplicateError,
    keystore::KeyStore,
    want::{self, ParsedWant},
};

/// A callback invoked after a feed accepts a new packet or completes a
/// blob chain. Receives the fid that changed.
pub type Callback = Box<dyn Fn([u8; FID_SIZE]) + Send + Sync>;

/// Owns the on-disk feed directory and drives replication.
pub struct FeedManager {
    store: FeedStore,
    keys: KeyStore,
    dmx: DmxTable,
    callbacks: Mutex<HashMap<[u8; FID_SIZE], Vec<Callback>>>,
}

impl FeedManager {
    /// Open (or initialise) a feed manager rooted at `feeds_dir`/`blobs_dir`,
    /// populating the DMX table from whatever feeds already exist on disk.
    ///
    /// Every known feed gets a want-dmx entry. Feeds we do not hold the key
    /// for (we are only a consumer) additionally get a next-packet-dmx or
    /// blob-pointer entry, since only a consumer needs to recognise
    /// unsolicited broadcasts of data it doesn't already have.
    pub fn open(feeds_dir: impl Into<std::path::PathBuf>, blobs_dir: impl Into<std::path::PathBuf>) -> Result<Self, ReplicateError> {
        let store = FeedStore::new(feeds_dir, blobs_dir);
        let manager = Self {
            store,
            keys: KeyStore::new(),
            dmx: DmxTable::new(),
            callbacks: Mutex::new(HashMap::new()),
        };
        manager.fill_dmx()?;
        Ok(manager)
    }

    fn fill_dmx(&self) -> Result<(), ReplicateError> {
        for fid in self.store.list_fids()? {
            self.dmx.insert(packet::want_dmx(&fid).to_vec(), DmxEntry::Want { fid });
            if !self.keys.has_key(&fid) {
                self.install_pull_entry(&fid)?;
            }
        }
        Ok(())
    }

    fn install_pull_entry(&self, fid: &[u8; FID_SIZE]) -> Result<(), ReplicateError> {
        let feed = self.store.open(fid)?;
        match feed.get_want()? {
            Want::NextPacket { fid, seq } => {
                let dmx = packet::next_packet_dmx(&fid, seq, &feed.header().front_mid());
                self.dmx.insert(dmx.to_vec(), DmxEntry::NextPacket { fid });
            },
            Want::Blob { fid, ptr, .. } => {
                self.dmx.insert(ptr.to_vec(), DmxEntry::Blob { fid });
            },
        }
        Ok(())
    }

    /// Create a feed. If `skey` is `Some`, it is remembered as the private
    /// key we produce into this feed with; otherwise this is a
    /// consumer-only feed and a pull entry (next-packet or blob) is
    /// installed immediately.
    pub fn create_feed(
        &self,
        fid: [u8; FID_SIZE],
        skey: Option<[u8; 32]>,
        parent: Option<([u8; FID_SIZE], u32)>,
    ) -> Result<(), ReplicateError> {
        match parent {
            Some((parent_fid, parent_seq)) => {
                Feed::create_child(self.store.feeds_dir(), self.store.blobs_dir(), fid, parent_fid, parent_seq)?;
            },
            None => {
                Feed::create_root(self.store.feeds_dir(), self.store.blobs_dir(), fid)?;
            },
        }
        if let Some(seed) = skey {
            self.keys.insert(fid, seed);
        }
        self.dmx.insert(packet::want_dmx(&fid).to_vec(), DmxEntry::Want { fid });
        if skey.is_none() {
            self.install_pull_entry(&fid)?;
        }
        Ok(())
    }

    /// Producer-side: declare `child_fid` as a child of `parent_fid` (which
    /// we must hold the key for), and create the child feed's own first
    /// (`ISCHILD`) packet, signed with `child_skey`.
    pub fn create_child_feed(
        &self,
        parent_fid: [u8; FID_SIZE],
        child_fid: [u8; FID_SIZE],
        child_skey: [u8; 32],
    ) -> Result<(), ReplicateError> {
        let parent_seed =
            self.keys.get(&parent_fid).ok_or_else(|| ReplicateError::NoSigningKey(hex::encode(parent_fid)))?;
        let parent_signer = Ed25519Signer::from_seed(&parent_seed);

        let mut parent = self.store.open(&parent_fid)?;
        let declaring = parent.append_payload(&parent_signer, PacketType::MkChild, &child_fid)?;
        let parent_seq = parent.header().front_seq();
        let declaring_hash = tinyssb_codec::hash::digest(&[&declaring.to_bytes()]);

        self.create_feed(child_fid, Some(child_skey), Some((parent_fid, parent_seq)))?;

        let child_signer = Ed25519Signer::from_seed(&child_skey);
        let mut child_payload = Vec::with_capacity(FID_SIZE + 4 + 12);
        child_payload.extend_from_slice(&parent_fid);
        child_payload.extend_from_slice(&parent_seq.to_be_bytes());
        child_payload.extend_from_slice(&declaring_hash[..12]);
        let mut child = self.store.open(&child_fid)?;
        child.append_payload(&child_signer, PacketType::IsChild, &child_payload)?;

        Ok(())
    }

    /// Producer-side: declare `new_fid` as the continuation of `end_fid`
    /// (ending it), mirroring [`Self::create_child_feed`] with
    /// `CONTDAS`/`ISCONTN`.
    pub fn create_contn_feed(
        &self,
        end_fid: [u8; FID_SIZE],
        new_fid: [u8; FID_SIZE],
        new_skey: [u8; 32],
    ) -> Result<(), ReplicateError> {
        let end_seed =
            self.keys.get(&end_fid).ok_or_else(|| ReplicateError::NoSigningKey(hex::encode(end_fid)))?;
        let end_signer = Ed25519Signer::from_seed(&end_seed);

        let mut end = self.store.open(&end_fid)?;
        let declaring = end.append_payload(&end_signer, PacketType::ContDas, &new_fid)?;
        let end_seq = end.header().front_seq();
        let declaring_hash = tinyssb_codec::hash::digest(&[&declaring.to_bytes()]);

        self.create_feed(new_fid, Some(new_skey), Some((end_fid, end_seq)))?;

        let new_signer = Ed25519Signer::from_seed(&new_skey);
        let mut payload = Vec::with_capacity(FID_SIZE + 4 + 12);
        payload.extend_from_slice(&end_fid);
        payload.extend_from_slice(&end_seq.to_be_bytes());
        payload.extend_from_slice(&declaring_hash[..12]);
        let mut new_feed = self.store.open(&new_fid)?;
        new_feed.append_payload(&new_signer, PacketType::IsContn, &payload)?;

        Ok(())
    }

    /// Look up the DMX table by the raw key bytes from an incoming frame.
    #[must_use]
    pub fn consult_dmx(&self, key: &[u8]) -> Option<DmxEntry> {
        self.dmx.lookup(key)
    }

    /// Serve a want request, returning the 128-byte frame to send back (the
    /// requested packet or blob), or `None` if we don't have it.
    pub fn handle_want(&self, frame: &[u8]) -> Result<Option<[u8; 128]>, ReplicateError> {
        let ParsedWant { fid, seq, ptr } = want::parse(frame)?;
        let feed = match self.store.open(&fid) {
            Ok(feed) => feed,
            Err(_) => return Ok(None),
        };

        match ptr {
            Some(ptr) => Ok(self.load_blob_frame(&ptr).map(|f| f.to_bytes())),
            None => match feed.get_wire(i64::from(seq)) {
                Ok(wire) => {
                    let mut out = [0u8; 128];
                    out[8..].copy_from_slice(&wire.to_bytes());
                    Ok(Some(out))
                },
                Err(_) => Ok(None),
            },
        }
    }

    fn load_blob_frame(&self, ptr: &[u8; MID_SIZE]) -> Option<BlobFrame> {
        let hex = hex::encode(ptr);
        let path = self.store.blobs_dir().join(&hex[..2]).join(&hex[2..]);
        let bytes = std::fs::read(path).ok()?;
        BlobFrame::from_bytes(&bytes).ok()
    }

    /// Verify and append an incoming 128-byte packet frame to `fid`'s feed,
    /// updating the DMX table and running registered callbacks on success.
    pub fn handle_packet(&self, fid: [u8; FID_SIZE], frame: &[u8; 128]) -> Result<(), ReplicateError> {
        let verifier = Ed25519Verifier::from_public_key(&fid)
            .map_err(|_| ReplicateError::MalformedFrame("invalid fid as verifying key".to_string()))?;
        let wire = WirePacket::from_bytes(&frame[8..])?;

        let mut feed = self.store.open(&fid)?;
        let Some(_mid) = feed.verify_and_append(&verifier, &wire)? else {
            return Ok(());
        };

        self.dmx.remove_pull_entry_for(&fid);
        self.install_pull_entry(&fid)?;

        if let Some(ty) = wire.packet_type() {
            self.maybe_create_declared_feed(fid, feed.header().front_seq(), ty, &wire.payload())?;
        }

        self.run_callbacks(fid);
        Ok(())
    }

    fn maybe_create_declared_feed(
        &self,
        parent_fid: [u8; FID_SIZE],
        parent_seq: u32,
        ty: PacketType,
        payload: &[u8],
    ) -> Result<(), ReplicateError> {
        let declared_fid = match ty {
            PacketType::MkChild | PacketType::ContDas if payload.len() >= FID_SIZE => {
                let mut fid = [0u8; FID_SIZE];
                fid.copy_from_slice(&payload[..FID_SIZE]);
                Some(fid)
            },
            _ => None,
        };
        let Some(declared_fid) = declared_fid else { return Ok(()) };
        if self.store.open(&declared_fid).is_ok() {
            return Ok(());
        }
        tracing::info!(
            parent = %hex::encode(parent_fid),
            child = %hex::encode(declared_fid),
            "auto-creating declared feed"
        );
        self.create_feed(declared_fid, None, Some((parent_fid, parent_seq)))
    }

    /// Verify and store an incoming 128-byte blob frame against `fid`'s
    /// current chain wait. Installs the next pull entry and runs callbacks
    /// only when the chain is now complete (§4.3).
    pub fn handle_blob(&self, fid: [u8; FID_SIZE], frame: &[u8; 128]) -> Result<(), ReplicateError> {
        let blob = BlobFrame::from_bytes(frame)?;
        let mut feed = self.store.open(&fid)?;

        let Some(expected_ptr) = feed.waiting_for_blob()? else { return Ok(()) };
        if !feed.verify_and_append_blob(&blob)? {
            return Ok(());
        }

        self.dmx.remove(&expected_ptr);
        self.install_pull_entry(&fid)?;

        if feed.waiting_for_blob()?.is_none() {
            self.run_callbacks(fid);
        }
        Ok(())
    }

    /// Register a callback to run whenever `fid` accepts a new packet or
    /// completes a blob chain.
    pub fn register_callback(&self, fid: [u8; FID_SIZE], callback: Callback) {
        self.callbacks.lock().expect("callback lock poisoned").entry(fid).or_default().push(callback);
    }

    /// Remove every callback registered for `fid`.
    pub fn remove_callbacks(&self, fid: &[u8; FID_SIZE]) {
        self.callbacks.lock().expect("callback lock poisoned").remove(fid);
    }

    fn run_callbacks(&self, fid: [u8; FID_SIZE]) {
        // Callbacks are not `Clone`, so unlike the DMX table mutation above
        // this can't extract-then-release; it holds callback_lock across
        // the calls instead. Callbacks must not touch dmx_lock.
        let guard = self.callbacks.lock().expect("callback lock poisoned");
        if let Some(list) = guard.get(&fid) {
            for cb in list {
                cb(fid);
            }
        }
    }

    /// Generate and remember a fresh key pair, returning the new fid.
    #[must_use]
    pub fn generate_keypair(&self) -> [u8; FID_SIZE] {
        self.keys.generate_and_store()
    }

    /// The underlying feed store, for callers that need direct read access
    /// (e.g. the version manager walking feed topology).
    #[must_use]
    pub fn store(&self) -> &FeedStore {
        &self.store
    }

    /// Whether we hold the private key for `fid`.
    #[must_use]
    pub fn has_key(&self, fid: &[u8; FID_SIZE]) -> bool {
        self.keys.has_key(fid)
    }

    /// The private key for `fid`, if we hold it.
    #[must_use]
    pub fn key_for(&self, fid: &[u8; FID_SIZE]) -> Option<[u8; 32]> {
        self.keys.get(fid)
    }
}
