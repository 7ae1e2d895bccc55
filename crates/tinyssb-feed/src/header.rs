//! Fixed 128-byte feed header, zero-copy parsed.
//!
//! Tracks the two cursors that bound a feed's log: `anchor_*` (the oldest
//! record still on disk — always 0/`fid[:20]` until a pruning feature is
//! added, which this implementation does not have) and `front_*` (the most
//! recently appended record). All multi-byte integers are big-endian.

use tinyssb_codec::constants::{FID_SIZE, HEADER_SIZE, MID_SIZE};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::FeedError;

/// Fixed 128-byte feed header record (big-endian, packed).
///
/// Layout: 12 reserved | fid(32) | parent_fid(32) | parent_seq(4) |
/// anchor_seq(4) | anchor_mid(20) | front_seq(4) | front_mid(20).
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FeedHeader {
    reserved: [u8; 12],
    fid: [u8; FID_SIZE],
    parent_fid: [u8; FID_SIZE],
    parent_seq: [u8; 4],
    anchor_seq: [u8; 4],
    anchor_mid: [u8; MID_SIZE],
    front_seq: [u8; 4],
    front_mid: [u8; MID_SIZE],
}

impl FeedHeader {
    /// Size of the serialized header.
    pub const SIZE: usize = HEADER_SIZE;

    /// Build a fresh header for a top-level feed with no parent.
    ///
    /// `front_mid`/`anchor_mid` follow the self-signed convention: the
    /// first 20 bytes of the feed id stand in for "message id of packet 0".
    #[must_use]
    pub fn new_root(fid: [u8; FID_SIZE]) -> Self {
        let mut self_mid = [0u8; MID_SIZE];
        self_mid.copy_from_slice(&fid[..MID_SIZE]);
        Self {
            reserved: [0u8; 12],
            fid,
            parent_fid: [0u8; FID_SIZE],
            parent_seq: [0u8; 4],
            anchor_seq: [0u8; 4],
            anchor_mid: self_mid,
            front_seq: [0u8; 4],
            front_mid: self_mid,
        }
    }

    /// Build a header for a feed that is the child of `parent_fid` at
    /// `parent_seq`.
    #[must_use]
    pub fn new_child(fid: [u8; FID_SIZE], parent_fid: [u8; FID_SIZE], parent_seq: u32) -> Self {
        let mut header = Self::new_root(fid);
        header.parent_fid = parent_fid;
        header.parent_seq = parent_seq.to_be_bytes();
        header
    }

    /// Parse a header from an exactly 128-byte buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FeedError> {
        let header = Self::read_from_bytes(bytes)
            .map_err(|_| FeedError::Truncated { expected: Self::SIZE, actual: bytes.len() })?;
        Ok(header)
    }

    /// Serialize to a fixed-size byte array.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let bytes = IntoBytes::as_bytes(self);
        let mut arr = [0u8; HEADER_SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// This feed's 32-byte id (its Ed25519 public key).
    #[must_use]
    pub fn fid(&self) -> [u8; FID_SIZE] {
        self.fid
    }

    /// The parent feed's id, or all-zero if this is a top-level feed.
    #[must_use]
    pub fn parent_fid(&self) -> [u8; FID_SIZE] {
        self.parent_fid
    }

    /// Whether this feed has a parent.
    #[must_use]
    pub fn has_parent(&self) -> bool {
        self.parent_fid != [0u8; FID_SIZE]
    }

    /// Sequence number within the parent feed of the packet that declared
    /// this feed (`MKCHILD`/`CONTDAS`).
    #[must_use]
    pub fn parent_seq(&self) -> u32 {
        u32::from_be_bytes(self.parent_seq)
    }

    /// Oldest sequence number still present on disk.
    #[must_use]
    pub fn anchor_seq(&self) -> u32 {
        u32::from_be_bytes(self.anchor_seq)
    }

    /// Message id of the record at `anchor_seq`.
    #[must_use]
    pub fn anchor_mid(&self) -> [u8; MID_SIZE] {
        self.anchor_mid
    }

    /// Sequence number of the most recently appended record.
    #[must_use]
    pub fn front_seq(&self) -> u32 {
        u32::from_be_bytes(self.front_seq)
    }

    /// Message id of the record at `front_seq`.
    #[must_use]
    pub fn front_mid(&self) -> [u8; MID_SIZE] {
        self.front_mid
    }

    /// Number of records currently on disk (`front_seq - anchor_seq`).
    #[must_use]
    pub fn len(&self) -> u32 {
        self.front_seq() - self.anchor_seq()
    }

    /// Whether the feed has no appended records yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advance the front cursor after a successful append.
    pub fn advance_front(&mut self, new_mid: [u8; MID_SIZE]) {
        self.front_seq = (self.front_seq() + 1).to_be_bytes();
        self.front_mid = new_mid;
    }
}

impl std::fmt::Debug for FeedHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedHeader")
            .field("fid", &hex::encode(self.fid()))
            .field("parent_fid", &hex::encode(self.parent_fid()))
            .field("parent_seq", &self.parent_seq())
            .field("anchor_seq", &self.anchor_seq())
            .field("front_seq", &self.front_seq())
            .finish_non_exhaustive()
    }
}

impl PartialEq for FeedHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for FeedHeader {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_128() {
        assert_eq!(std::mem::size_of::<FeedHeader>(), FeedHeader::SIZE);
        assert_eq!(FeedHeader::SIZE, 128);
    }

    #[test]
    fn new_root_is_self_signed() {
        let fid = [7u8; 32];
        let header = FeedHeader::new_root(fid);
        assert_eq!(header.fid(), fid);
        assert!(!header.has_parent());
        assert_eq!(header.front_mid()[..], fid[..20]);
        assert_eq!(header.anchor_mid()[..], fid[..20]);
        assert!(header.is_empty());
    }

    #[test]
    fn round_trips_through_bytes() {
        let fid = [1u8; 32];
        let parent = [2u8; 32];
        let header = FeedHeader::new_child(fid, parent, 3);
        let bytes = header.to_bytes();
        let parsed = FeedHeader::from_bytes(&bytes).expect("should parse");
        assert_eq!(header, parsed);
        assert_eq!(parsed.parent_fid(), parent);
        assert_eq!(parsed.parent_seq(), 3);
    }

    #[test]
    fn rejects_short_buffer() {
        let short = [0u8; 100];
        let err = FeedHeader::from_bytes(&short).unwrap_err();
        assert!(matches!(err, FeedError::Truncated { expected: 128, actual: 100 }));
    }

    #[test]
    fn advance_front_increments_seq_and_updates_mid() {
        let mut header = FeedHeader::new_root([9u8; 32]);
        let new_mid = [5u8; 20];
        header.advance_front(new_mid);
        assert_eq!(header.front_seq(), 1);
        assert_eq!(header.front_mid(), new_mid);
        assert_eq!(header.len(), 1);
    }
}
