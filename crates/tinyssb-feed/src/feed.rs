//! A single append-only feed: its header plus the growing log of wire
//! packets, backed by two flat files under a feeds directory.

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tinyssb_codec::{
    constants::{FID_SIZE, MID_SIZE, PACKET_SIZE, PLAIN_PAYLOAD_SIZE},
    signer::{Signer, Verifier},
    PacketType,
};

use crate::{
    blob::{self, BlobFrame, ChainHead, NULL_PTR},
    error::FeedError,
    header::FeedHeader,
    packet::{self, WirePacket},
};

/// Bytes reserved at the front of every log record (ahead of the 120-byte
/// wire packet), matching the on-disk 128-byte record size.
const LOG_RECORD_SIZE: usize = 128;
const LOG_RECORD_RESERVED: usize = LOG_RECORD_SIZE - PACKET_SIZE;

/// What a feed is currently waiting to receive next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Want {
    /// Waiting for the packet at `seq`.
    NextPacket {
        /// The feed's id.
        fid: [u8; FID_SIZE],
        /// Sequence number of the next expected packet.
        seq: u32,
    },
    /// Waiting for the blob frame at `ptr`.
    Blob {
        /// The feed's id.
        fid: [u8; FID_SIZE],
        /// Sequence number of the `CHAIN20` head that is waiting.
        seq: u32,
        /// Pointer of the missing frame.
        ptr: [u8; MID_SIZE],
    },
}

/// A single append-only feed log, backed by `<fid>.head` and `<fid>.log`
/// under `feeds_dir`, with blob frames under `blobs_dir`.
pub struct Feed {
    header: FeedHeader,
    feeds_dir: PathBuf,
    blobs_dir: PathBuf,
}

fn head_path(feeds_dir: &Path, fid: &[u8; FID_SIZE]) -> PathBuf {
    feeds_dir.join(format!("{}.head", hex::encode(fid)))
}

fn log_path(feeds_dir: &Path, fid: &[u8; FID_SIZE]) -> PathBuf {
    feeds_dir.join(format!("{}.log", hex::encode(fid)))
}

fn blob_path(blobs_dir: &Path, ptr: &[u8; MID_SIZE]) -> PathBuf {
    let hex = hex::encode(ptr);
    blobs_dir.join(&hex[..2]).join(&hex[2..])
}

impl Feed {
    /// Open an existing feed from disk.
    pub fn open(
        feeds_dir: impl Into<PathBuf>,
        blobs_dir: impl Into<PathBuf>,
        fid: &[u8; FID_SIZE],
    ) -> Result<Self, FeedError> {
        let feeds_dir = feeds_dir.into();
        let blobs_dir = blobs_dir.into();
        let path = head_path(&feeds_dir, fid);
        let mut file = File::open(&path)
            .map_err(|_| FeedError::NotFound(hex::encode(fid)))?;
        let mut buf = [0u8; FeedHeader::SIZE];
        file.read_exact(&mut buf)?;
        let header = FeedHeader::from_bytes(&buf)?;
        Ok(Self { header, feeds_dir, blobs_dir })
    }

    /// Create a new top-level feed and persist its header and empty log.
    pub fn create_root(
        feeds_dir: impl Into<PathBuf>,
        blobs_dir: impl Into<PathBuf>,
        fid: [u8; FID_SIZE],
    ) -> Result<Self, FeedError> {
        Self::create(feeds_dir, blobs_dir, FeedHeader::new_root(fid))
    }

    /// Create a new feed that is a child of `parent_fid` at `parent_seq`.
    pub fn create_child(
        feeds_dir: impl Into<PathBuf>,
        blobs_dir: impl Into<PathBuf>,
        fid: [u8; FID_SIZE],
        parent_fid: [u8; FID_SIZE],
        parent_seq: u32,
    ) -> Result<Self, FeedError> {
        Self::create(feeds_dir, blobs_dir, FeedHeader::new_child(fid, parent_fid, parent_seq))
    }

    fn create(
        feeds_dir: impl Into<PathBuf>,
        blobs_dir: impl Into<PathBuf>,
        header: FeedHeader,
    ) -> Result<Self, FeedError> {
        let feeds_dir = feeds_dir.into();
        let blobs_dir = blobs_dir.into();
        std::fs::create_dir_all(&feeds_dir)?;
        std::fs::create_dir_all(&blobs_dir)?;

        let fid = header.fid();
        let head_path = head_path(&feeds_dir, &fid);
        let mut head_file = OpenOptions::new().write(true).create_new(true).open(&head_path)?;
        head_file.write_all(&header.to_bytes())?;

        let log_path = log_path(&feeds_dir, &fid);
        OpenOptions::new().write(true).create_new(true).open(&log_path)?;

        Ok(Self { header, feeds_dir, blobs_dir })
    }

    /// This feed's header (sequence cursors, parent, fid).
    #[must_use]
    pub fn header(&self) -> &FeedHeader {
        &self.header
    }

    /// This feed's id.
    #[must_use]
    pub fn fid(&self) -> [u8; FID_SIZE] {
        self.header.fid()
    }

    fn persist_header(&self) -> Result<(), FeedError> {
        let mut file = OpenOptions::new().write(true).open(head_path(&self.feeds_dir, &self.fid()))?;
        file.write_all(&self.header.to_bytes())?;
        Ok(())
    }

    fn append_record(&mut self, record: WirePacket, new_mid: [u8; MID_SIZE]) -> Result<(), FeedError> {
        let mut file = OpenOptions::new().append(true).open(log_path(&self.feeds_dir, &self.fid()))?;
        let mut buf = [0u8; LOG_RECORD_SIZE];
        buf[LOG_RECORD_RESERVED..].copy_from_slice(&record.to_bytes());
        file.write_all(&buf)?;
        self.header.advance_front(new_mid);
        self.persist_header()
    }

    /// Append a signed `PLAIN48` (or other non-chain) packet as the
    /// feed's producer. `payload` must be at most 48 bytes.
    pub fn append_payload(
        &mut self,
        signer: &dyn Signer,
        pkt_type: PacketType,
        payload: &[u8],
    ) -> Result<WirePacket, FeedError> {
        let fid = self.fid();
        let seq = self.header.front_seq() + 1;
        let prev_mid = self.header.front_mid();
        let packet = packet::build_and_sign(signer, &fid, seq, &prev_mid, pkt_type, payload)?;
        let name = packet::virtual_name(&fid, seq, &prev_mid);
        let mid = packet::message_id(&name, &packet);
        self.append_record(packet, mid)?;
        Ok(packet)
    }

    /// Split `content` into a blob chain, write its frames to the blob
    /// store, and append the signed `CHAIN20` head packet.
    pub fn append_blob(&mut self, signer: &dyn Signer, content: &[u8]) -> Result<WirePacket, FeedError> {
        let (head_payload, frames) = blob::build_chain(content);
        for frame in &frames {
            let ptr = frame.pointer();
            let path = blob_path(&self.blobs_dir, &ptr);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, frame.to_bytes())?;
        }
        self.append_payload(signer, PacketType::Chain20, &head_payload)
    }

    /// Read the raw wire packet at `index`. Negative indices count back
    /// from the front (`-1` is the most recent).
    pub fn get_wire(&self, index: i64) -> Result<WirePacket, FeedError> {
        let seq = self.resolve_index(index)?;
        let anchor = self.header.anchor_seq();
        let mut file = File::open(log_path(&self.feeds_dir, &self.fid()))?;
        let offset = (seq - anchor - 1) as u64 * LOG_RECORD_SIZE as u64;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = [0u8; LOG_RECORD_SIZE];
        file.read_exact(&mut buf)?;
        WirePacket::from_bytes(&buf[LOG_RECORD_RESERVED..])
    }

    fn resolve_index(&self, index: i64) -> Result<u32, FeedError> {
        let anchor = self.header.anchor_seq();
        let front = self.header.front_seq();
        let seq = if index < 0 {
            front as i64 + index + 1
        } else {
            index
        };
        if seq <= anchor as i64 || seq > front as i64 {
            return Err(FeedError::OutOfRange { seq, anchor, front });
        }
        Ok(seq as u32)
    }

    /// Read the logical payload at `index`: the zero-padded 48 bytes for a
    /// plain packet, or the fully reassembled blob for a `CHAIN20` head.
    pub fn get_payload(&self, index: i64) -> Result<Vec<u8>, FeedError> {
        let wire = self.get_wire(index)?;
        match wire.packet_type() {
            Some(PacketType::Chain20) => {
                let head = ChainHead::decode(&wire.payload())?;
                blob::assemble(&head, |ptr| self.load_blob_frame(ptr))
            },
            _ => Ok(wire.payload().to_vec()),
        }
    }

    fn load_blob_frame(&self, ptr: &[u8; MID_SIZE]) -> Option<BlobFrame> {
        let bytes = std::fs::read(blob_path(&self.blobs_dir, ptr)).ok()?;
        BlobFrame::from_bytes(&bytes).ok()
    }

    /// Verify and append a candidate wire packet received from the network.
    /// Returns the new message id if it was accepted, or `None` if it was
    /// dropped (bad DMX/signature) without changing feed state.
    pub fn verify_and_append(
        &mut self,
        verifier: &dyn Verifier,
        wire: &WirePacket,
    ) -> Result<Option<[u8; MID_SIZE]>, FeedError> {
        let fid = self.fid();
        let seq = self.header.front_seq() + 1;
        let prev_mid = self.header.front_mid();
        match packet::verify(verifier, &fid, seq, &prev_mid, wire) {
            Ok(mid) => {
                self.append_record(*wire, mid)?;
                Ok(Some(mid))
            },
            Err(_) => {
                tracing::debug!(fid = %hex::encode(fid), seq, "dropping packet: verification failed");
                Ok(None)
            },
        }
    }

    /// If the feed is currently mid-chain, the pointer of the blob frame it
    /// is waiting for.
    pub fn waiting_for_blob(&self) -> Result<Option<[u8; MID_SIZE]>, FeedError> {
        if self.header.is_empty() {
            return Ok(None);
        }
        let wire = self.get_wire(-1)?;
        if wire.packet_type() != Some(PacketType::Chain20) {
            return Ok(None);
        }
        let head = ChainHead::decode(&wire.payload())?;
        let mut ptr = head.next_ptr;
        let mut consumed = head.head_bytes.len();
        while ptr != NULL_PTR {
            match self.load_blob_frame(&ptr) {
                Some(frame) => {
                    consumed += tinyssb_codec::constants::BLOB_PAYLOAD_SIZE
                        .min(head.total_size as usize - consumed);
                    ptr = frame.next_ptr();
                },
                None => return Ok(Some(ptr)),
            }
        }
        Ok(None)
    }

    /// Verify and store a blob frame received from the network against the
    /// pointer the feed is currently waiting for.
    pub fn verify_and_append_blob(&mut self, frame: &BlobFrame) -> Result<bool, FeedError> {
        let Some(expected) = self.waiting_for_blob()? else {
            return Ok(false);
        };
        if frame.pointer() != expected {
            return Ok(false);
        }
        let path = blob_path(&self.blobs_dir, &expected);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, frame.to_bytes())?;
        Ok(true)
    }

    /// What this feed currently wants from the network.
    pub fn get_want(&self) -> Result<Want, FeedError> {
        let fid = self.fid();
        match self.waiting_for_blob()? {
            Some(ptr) => Ok(Want::Blob { fid, seq: self.header.front_seq(), ptr }),
            None => Ok(Want::NextPacket { fid, seq: self.header.front_seq() + 1 }),
        }
    }

    /// The parent feed's id, if any.
    #[must_use]
    pub fn parent(&self) -> Option<[u8; FID_SIZE]> {
        self.header.has_parent().then(|| self.header.parent_fid())
    }

    /// Number of packets currently on disk.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.header.len()
    }

    /// Whether the feed has no appended packets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use tinyssb_codec::signer::{Ed25519Signer, Ed25519Verifier};

    use super::*;

    fn new_signer() -> (Ed25519Signer, [u8; 32]) {
        let seed = [4u8; 32];
        let signer = Ed25519Signer::from_seed(&seed);
        let fid = signer.verifying_key();
        (signer, fid)
    }

    #[test]
    fn append_and_read_plain_payload() {
        let dir = tempdir().unwrap();
        let (signer, fid) = new_signer();
        let mut feed =
            Feed::create_root(dir.path().join("_feeds"), dir.path().join("_blobs"), fid).unwrap();

        feed.append_payload(&signer, PacketType::Plain48, b"hi").unwrap();
        assert_eq!(feed.len(), 1);

        let payload = feed.get_payload(1).unwrap();
        let mut expected = vec![0u8; 48];
        expected[..2].copy_from_slice(b"hi");
        assert_eq!(payload, expected);

        // Negative indexing reaches the same record.
        let last = feed.get_payload(-1).unwrap();
        assert_eq!(last, expected);
    }

    #[test]
    fn out_of_range_reads_are_rejected() {
        let dir = tempdir().unwrap();
        let (_signer, fid) = new_signer();
        let feed =
            Feed::create_root(dir.path().join("_feeds"), dir.path().join("_blobs"), fid).unwrap();

        assert!(matches!(feed.get_wire(0), Err(FeedError::OutOfRange { .. })));
        assert!(matches!(feed.get_wire(1), Err(FeedError::OutOfRange { .. })));
    }

    #[test]
    fn blob_round_trips_through_append_and_get_payload() {
        let dir = tempdir().unwrap();
        let (signer, fid) = new_signer();
        let mut feed =
            Feed::create_root(dir.path().join("_feeds"), dir.path().join("_blobs"), fid).unwrap();

        let content = vec![b'Z'; 250];
        feed.append_blob(&signer, &content).unwrap();

        let payload = feed.get_payload(1).unwrap();
        assert_eq!(payload, content);
    }

    #[test]
    fn verify_and_append_rejects_bad_signature() {
        let dir = tempdir().unwrap();
        let (signer, fid) = new_signer();
        let mut producer =
            Feed::create_root(dir.path().join("_feeds"), dir.path().join("_blobs"), fid).unwrap();
        let packet = producer.append_payload(&signer, PacketType::Plain48, b"ok").unwrap();

        let other_seed = [9u8; 32];
        let other_signer = Ed25519Signer::from_seed(&other_seed);
        let bad_packet =
            packet::build_and_sign(&other_signer, &fid, 1, &producer.header().anchor_mid(), PacketType::Plain48, b"ok")
                .unwrap();

        let consumer_dir = tempdir().unwrap();
        let mut consumer = Feed::create_root(
            consumer_dir.path().join("_feeds"),
            consumer_dir.path().join("_blobs"),
            fid,
        )
        .unwrap();
        let verifier = Ed25519Verifier::from_public_key(&fid).unwrap();

        let result = consumer.verify_and_append(&verifier, &bad_packet).unwrap();
        assert!(result.is_none());
        assert!(consumer.is_empty());

        let accepted = consumer.verify_and_append(&verifier, &packet).unwrap();
        assert!(accepted.is_some());
        assert_eq!(consumer.len(), 1);
    }
}
