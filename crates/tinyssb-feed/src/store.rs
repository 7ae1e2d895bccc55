//! Directory-wide feed topology queries: listing known feeds and walking
//! parent/child/continuation relationships, none of which a single
//! [`Feed`] can answer from its own header alone.

use std::path::{Path, PathBuf};

use tinyssb_codec::constants::FID_SIZE;

use crate::{error::FeedError, feed::Feed, packet::WirePacket};
use tinyssb_codec::PacketType;

/// Read-only directory of feeds rooted at `feeds_dir`/`blobs_dir`.
pub struct FeedStore {
    feeds_dir: PathBuf,
    blobs_dir: PathBuf,
}

impl FeedStore {
    /// Open a store rooted at the given directories. Does not require that
    /// they already exist.
    #[must_use]
    pub fn new(feeds_dir: impl Into<PathBuf>, blobs_dir: impl Into<PathBuf>) -> Self {
        Self { feeds_dir: feeds_dir.into(), blobs_dir: blobs_dir.into() }
    }

    /// The feeds directory this store scans.
    #[must_use]
    pub fn feeds_dir(&self) -> &Path {
        &self.feeds_dir
    }

    /// The blobs directory this store writes to.
    #[must_use]
    pub fn blobs_dir(&self) -> &Path {
        &self.blobs_dir
    }

    /// List the fids of every feed with a header file on disk.
    pub fn list_fids(&self) -> Result<Vec<[u8; FID_SIZE]>, FeedError> {
        let mut out = Vec::new();
        if !self.feeds_dir.exists() {
            return Ok(out);
        }
        for entry in std::fs::read_dir(&self.feeds_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("head") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let Ok(bytes) = hex::decode(stem) else { continue };
            if bytes.len() != FID_SIZE {
                continue;
            }
            let mut fid = [0u8; FID_SIZE];
            fid.copy_from_slice(&bytes);
            out.push(fid);
        }
        Ok(out)
    }

    /// Open the feed with the given id.
    pub fn open(&self, fid: &[u8; FID_SIZE]) -> Result<Feed, FeedError> {
        Feed::open(&self.feeds_dir, &self.blobs_dir, fid)
    }

    /// Every feed whose header declares `fid` as its parent.
    pub fn children_of(&self, fid: &[u8; FID_SIZE]) -> Result<Vec<[u8; FID_SIZE]>, FeedError> {
        let mut out = Vec::new();
        for candidate in self.list_fids()? {
            let feed = self.open(&candidate)?;
            if feed.parent() == Some(*fid) {
                out.push(candidate);
            }
        }
        Ok(out)
    }

    /// If `fid`'s feed ends with a `CONTDAS` packet, the successor feed id
    /// it declares.
    pub fn continuation_of(&self, fid: &[u8; FID_SIZE]) -> Result<Option<[u8; FID_SIZE]>, FeedError> {
        let feed = self.open(fid)?;
        if feed.is_empty() {
            return Ok(None);
        }
        let last = feed.get_wire(-1)?;
        Ok(decode_contdas_successor(&last))
    }

    /// The feed, if any, whose `CONTDAS` packet names `fid` as its
    /// successor (the inverse of [`Self::continuation_of`]).
    pub fn predecessor_of(&self, fid: &[u8; FID_SIZE]) -> Result<Option<[u8; FID_SIZE]>, FeedError> {
        for candidate in self.list_fids()? {
            if candidate == *fid {
                continue;
            }
            if self.continuation_of(&candidate)?.as_ref() == Some(fid) {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

fn decode_contdas_successor(wire: &WirePacket) -> Option<[u8; FID_SIZE]> {
    if wire.packet_type() != Some(PacketType::ContDas) {
        return None;
    }
    let payload = wire.payload();
    if payload.len() < FID_SIZE {
        return None;
    }
    let mut fid = [0u8; FID_SIZE];
    fid.copy_from_slice(&payload[..FID_SIZE]);
    Some(fid)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use tinyssb_codec::signer::Ed25519Signer;

    use super::*;

    #[test]
    fn lists_children_by_parent_fid() {
        let dir = tempdir().unwrap();
        let store = FeedStore::new(dir.path().join("_feeds"), dir.path().join("_blobs"));

        let parent_fid = [1u8; 32];
        let child_fid = [2u8; 32];
        Feed::create_root(store.feeds_dir(), store.blobs_dir(), parent_fid).unwrap();
        Feed::create_child(store.feeds_dir(), store.blobs_dir(), child_fid, parent_fid, 1).unwrap();

        let children = store.children_of(&parent_fid).unwrap();
        assert_eq!(children, vec![child_fid]);
        assert!(store.children_of(&child_fid).unwrap().is_empty());
    }

    #[test]
    fn continuation_round_trips_with_predecessor() {
        let dir = tempdir().unwrap();
        let store = FeedStore::new(dir.path().join("_feeds"), dir.path().join("_blobs"));

        let old_fid = [3u8; 32];
        let new_fid = [4u8; 32];
        let signer = Ed25519Signer::from_seed(&[5u8; 32]);
        let mut old_feed = Feed::create_root(store.feeds_dir(), store.blobs_dir(), old_fid).unwrap();

        let mut payload = vec![0u8; 0];
        payload.extend_from_slice(&new_fid);
        old_feed
            .append_payload(&signer, tinyssb_codec::PacketType::ContDas, &payload)
            .unwrap();

        assert_eq!(store.continuation_of(&old_fid).unwrap(), Some(new_fid));
        assert_eq!(store.predecessor_of(&new_fid).unwrap(), Some(old_fid));
    }
}
