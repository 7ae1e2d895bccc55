//! The demultiplexing table: a map from a 7-byte or 20-byte on-wire key to
//! the feed it routes to.
//!
//! Invariant (§3.4): for any given feed, exactly one of `NextPacket`/`Blob`
//! is present at a time, alongside its always-present `Want` entry.

use std::{collections::HashMap, sync::Mutex};

use tinyssb_codec::constants::FID_SIZE;

/// What a DMX table entry routes an incoming frame to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmxEntry {
    /// A want-dmx: someone may ask us for the next packet or a blob of
    /// this feed.
    Want {
        /// The feed being asked about.
        fid: [u8; FID_SIZE],
    },
    /// A next-packet-dmx: an incoming 128-byte frame matching this key is
    /// the next packet of this feed.
    NextPacket {
        /// The feed awaiting its next packet.
        fid: [u8; FID_SIZE],
    },
    /// A blob-pointer: an incoming 128-byte frame whose content hash
    /// matches this key is the next blob frame of this feed's chain.
    Blob {
        /// The feed awaiting this blob frame.
        fid: [u8; FID_SIZE],
    },
}

impl DmxEntry {
    /// The feed id this entry routes to, regardless of variant.
    #[must_use]
    pub fn fid(&self) -> [u8; FID_SIZE] {
        match self {
            DmxEntry::Want { fid } | DmxEntry::NextPacket { fid } | DmxEntry::Blob { fid } => *fid,
        }
    }
}

/// Thread-safe DMX table shared between the RX thread and the feed manager.
#[derive(Default)]
pub struct DmxTable {
    entries: Mutex<HashMap<Vec<u8>, DmxEntry>>,
}

impl DmxTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `key`.
    pub fn insert(&self, key: impl Into<Vec<u8>>, entry: DmxEntry) {
        self.entries.lock().expect("dmx lock poisoned").insert(key.into(), entry);
    }

    /// Remove the entry for `key`, if present.
    pub fn remove(&self, key: &[u8]) -> Option<DmxEntry> {
        self.entries.lock().expect("dmx lock poisoned").remove(key)
    }

    /// Look up the entry for `key`.
    #[must_use]
    pub fn lookup(&self, key: &[u8]) -> Option<DmxEntry> {
        self.entries.lock().expect("dmx lock poisoned").get(key).copied()
    }

    /// Remove whichever of `NextPacket`/`Blob` entry currently routes to
    /// `fid` (there is at most one, per the table invariant).
    pub fn remove_pull_entry_for(&self, fid: &[u8; FID_SIZE]) {
        let mut entries = self.entries.lock().expect("dmx lock poisoned");
        entries.retain(|_, entry| {
            !matches!(
                entry,
                DmxEntry::NextPacket { fid: f } | DmxEntry::Blob { fid: f } if f == fid
            )
        });
    }

    /// Number of entries currently in the table (test/debug use).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("dmx lock poisoned").len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_lookup_remove_round_trip() {
        let table = DmxTable::new();
        let fid = [1u8; 32];
        let key = vec![1, 2, 3, 4, 5, 6, 7];
        table.insert(key.clone(), DmxEntry::Want { fid });

        assert_eq!(table.lookup(&key), Some(DmxEntry::Want { fid }));
        assert_eq!(table.remove(&key), Some(DmxEntry::Want { fid }));
        assert_eq!(table.lookup(&key), None);
    }

    #[test]
    fn remove_pull_entry_leaves_want_entry_untouched() {
        let table = DmxTable::new();
        let fid = [2u8; 32];
        table.insert(vec![0u8; 7], DmxEntry::Want { fid });
        table.insert(vec![1u8; 7], DmxEntry::NextPacket { fid });

        table.remove_pull_entry_for(&fid);

        assert_eq!(table.lookup(&[0u8; 7]), Some(DmxEntry::Want { fid }));
        assert_eq!(table.lookup(&[1u8; 7]), None);
    }
}
