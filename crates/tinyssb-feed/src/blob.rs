//! Blob side-chains: content-addressed 128-byte frames that carry payloads
//! too large for a single packet.
//!
//! A chain is built tail-first so every frame's `next_ptr` can be computed
//! before the frame ahead of it is written: the last frame points at
//! nothing (`[0; 20]`), each earlier frame points at the hash of the frame
//! behind it. The content address of a frame is `SHA-256(payload |
//! next_ptr)[:20]` — the same value used to both name the file on disk and
//! fill in the pointer that refers to it.

use tinyssb_codec::{
    constants::{BLOB_FRAME_SIZE, BLOB_PAYLOAD_SIZE, MID_SIZE, PLAIN_PAYLOAD_SIZE},
    hash::digest20,
    varint,
};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::FeedError;

/// A single 128-byte blob side-chain frame: `reserved(8) | payload(100) |
/// next_ptr(20)`.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct BlobFrame {
    reserved: [u8; 8],
    payload: [u8; BLOB_PAYLOAD_SIZE],
    next_ptr: [u8; MID_SIZE],
}

/// A null (all-zero) blob pointer, marking the tail of a chain.
pub const NULL_PTR: [u8; MID_SIZE] = [0u8; MID_SIZE];

impl BlobFrame {
    /// Size of the serialized frame.
    pub const SIZE: usize = BLOB_FRAME_SIZE;

    /// Parse a frame from an exactly 128-byte buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FeedError> {
        Self::read_from_bytes(bytes)
            .map_err(|_| FeedError::Truncated { expected: Self::SIZE, actual: bytes.len() })
    }

    /// Serialize to a fixed-size byte array.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; BLOB_FRAME_SIZE] {
        let bytes = IntoBytes::as_bytes(self);
        let mut arr = [0u8; BLOB_FRAME_SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// This frame's 100-byte (zero-padded) payload chunk.
    #[must_use]
    pub fn payload(&self) -> [u8; BLOB_PAYLOAD_SIZE] {
        self.payload
    }

    /// Pointer to the next frame, or [`NULL_PTR`] if this is the tail.
    #[must_use]
    pub fn next_ptr(&self) -> [u8; MID_SIZE] {
        self.next_ptr
    }

    /// This frame's own content address: `SHA-256(payload | next_ptr)[:20]`.
    #[must_use]
    pub fn pointer(&self) -> [u8; MID_SIZE] {
        digest20(&[&self.payload, &self.next_ptr])
    }
}

/// The decoded payload of a `CHAIN20` head packet.
pub struct ChainHead {
    /// Total byte length of the assembled blob.
    pub total_size: u64,
    /// Bytes of the blob embedded directly in the head packet.
    pub head_bytes: Vec<u8>,
    /// Pointer to the first side-chain frame, or [`NULL_PTR`] if the whole
    /// blob fit in `head_bytes`.
    pub next_ptr: [u8; MID_SIZE],
}

impl ChainHead {
    /// Decode a `CHAIN20` packet's 48-byte payload.
    pub fn decode(payload: &[u8; PLAIN_PAYLOAD_SIZE]) -> Result<Self, FeedError> {
        let (total_size, consumed) = varint::decode(payload)
            .map_err(|e| FeedError::ChainIncomplete(format!("bad chain head varint: {e}")))?;
        let head_end = PLAIN_PAYLOAD_SIZE - MID_SIZE;
        if consumed > head_end {
            return Err(FeedError::ChainIncomplete("chain head varint too long".to_string()));
        }
        let head_bytes = payload[consumed..head_end].to_vec();
        let mut next_ptr = [0u8; MID_SIZE];
        next_ptr.copy_from_slice(&payload[head_end..]);
        Ok(Self { total_size, head_bytes, next_ptr })
    }

    /// Encode a `CHAIN20` head payload for a blob of `total_size` whose
    /// first bytes are `head_bytes` and whose remainder starts at `next_ptr`.
    pub fn encode(
        total_size: u64,
        head_bytes: &[u8],
        next_ptr: [u8; MID_SIZE],
    ) -> Result<[u8; PLAIN_PAYLOAD_SIZE], FeedError> {
        let varint = varint::encode(total_size);
        let head_end = PLAIN_PAYLOAD_SIZE - MID_SIZE;
        if varint.len() + head_bytes.len() > head_end {
            return Err(FeedError::ChainIncomplete("chain head payload too long".to_string()));
        }
        let mut out = [0u8; PLAIN_PAYLOAD_SIZE];
        out[..varint.len()].copy_from_slice(&varint);
        out[varint.len()..varint.len() + head_bytes.len()].copy_from_slice(head_bytes);
        out[head_end..].copy_from_slice(&next_ptr);
        Ok(out)
    }

    /// Maximum number of bytes that fit directly in a chain head whose
    /// length varint needs `varint_len` bytes.
    #[must_use]
    pub fn head_capacity(varint_len: usize) -> usize {
        (PLAIN_PAYLOAD_SIZE - MID_SIZE).saturating_sub(varint_len)
    }
}

/// Split `content` into a chain head payload plus the ordered list of blob
/// frames that must be written to the blob store, tail-first (the caller
/// should store them in the returned order so every frame's `next_ptr`
/// target already exists, though content-addressing makes order irrelevant
/// for correctness).
#[must_use]
pub fn build_chain(content: &[u8]) -> (Vec<u8>, Vec<BlobFrame>) {
    let total_size = content.len() as u64;
    let varint_len = varint::encode(total_size).len();
    let head_capacity = ChainHead::head_capacity(varint_len);

    if content.len() <= head_capacity {
        let head_payload =
            ChainHead::encode(total_size, content, NULL_PTR).expect("fits by construction");
        return (head_payload.to_vec(), Vec::new());
    }

    let (head_bytes, remainder) = content.split_at(head_capacity);
    let chunks: Vec<&[u8]> = remainder.chunks(BLOB_PAYLOAD_SIZE).collect();

    let mut frames = Vec::with_capacity(chunks.len());
    let mut next_ptr = NULL_PTR;
    for chunk in chunks.iter().rev() {
        let mut payload = [0u8; BLOB_PAYLOAD_SIZE];
        payload[..chunk.len()].copy_from_slice(chunk);
        let frame = BlobFrame { reserved: [0u8; 8], payload, next_ptr };
        next_ptr = frame.pointer();
        frames.push(frame);
    }
    frames.reverse();

    let head_ptr = frames.first().map_or(NULL_PTR, BlobFrame::pointer);
    let head_payload =
        ChainHead::encode(total_size, head_bytes, head_ptr).expect("fits by construction");
    (head_payload.to_vec(), frames)
}

/// Reassemble a blob given its decoded chain head and a lookup closure that
/// returns a stored frame by pointer (`None` if not yet received).
pub fn assemble<F>(head: &ChainHead, mut lookup: F) -> Result<Vec<u8>, FeedError>
where
    F: FnMut(&[u8; MID_SIZE]) -> Option<BlobFrame>,
{
    let mut out = head.head_bytes.clone();
    let mut ptr = head.next_ptr;
    while ptr != NULL_PTR {
        let frame = lookup(&ptr).ok_or_else(|| FeedError::ChainIncomplete(hex::encode(ptr)))?;
        let remaining = head.total_size as usize - out.len();
        let take = remaining.min(BLOB_PAYLOAD_SIZE);
        out.extend_from_slice(&frame.payload()[..take]);
        ptr = frame.next_ptr();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn assemble_from_map(head: &ChainHead, frames: &HashMap<[u8; MID_SIZE], BlobFrame>) -> Vec<u8> {
        assemble(head, |ptr| frames.get(ptr).copied()).expect("complete chain")
    }

    #[test]
    fn short_blob_has_no_frames() {
        let content = vec![b'A'; 27];
        let (head_payload, frames) = build_chain(&content);
        assert!(frames.is_empty());

        let mut payload = [0u8; PLAIN_PAYLOAD_SIZE];
        payload.copy_from_slice(&head_payload);
        let head = ChainHead::decode(&payload).unwrap();
        assert_eq!(head.next_ptr, NULL_PTR);
        assert_eq!(head.total_size, 27);
        assert_eq!(head.head_bytes, content);
    }

    #[test]
    fn long_blob_round_trips_through_frames() {
        let content: Vec<u8> = (0..250u32).map(|i| (i % 251) as u8).collect();
        let (head_payload, frames) = build_chain(&content);
        assert!(!frames.is_empty());

        let mut payload = [0u8; PLAIN_PAYLOAD_SIZE];
        payload.copy_from_slice(&head_payload);
        let head = ChainHead::decode(&payload).unwrap();

        let map: HashMap<[u8; MID_SIZE], BlobFrame> =
            frames.iter().map(|f| (f.pointer(), *f)).collect();
        let assembled = assemble_from_map(&head, &map);
        assert_eq!(assembled, content);
    }

    #[test]
    fn incomplete_chain_reports_missing_pointer() {
        let content: Vec<u8> = vec![b'B'; 250];
        let (head_payload, frames) = build_chain(&content);
        let mut payload = [0u8; PLAIN_PAYLOAD_SIZE];
        payload.copy_from_slice(&head_payload);
        let head = ChainHead::decode(&payload).unwrap();

        // Drop the last frame so the chain cannot fully resolve.
        let map: HashMap<[u8; MID_SIZE], BlobFrame> =
            frames[..frames.len() - 1].iter().map(|f| (f.pointer(), *f)).collect();
        let err = assemble(&head, |ptr| map.get(ptr).copied()).unwrap_err();
        assert!(matches!(err, FeedError::ChainIncomplete(_)));
    }

    #[test]
    fn frame_pointer_is_stable_content_address() {
        let frame =
            BlobFrame { reserved: [0u8; 8], payload: [7u8; BLOB_PAYLOAD_SIZE], next_ptr: NULL_PTR };
        assert_eq!(frame.pointer(), frame.pointer());
        let bytes = frame.to_bytes();
        let parsed = BlobFrame::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.pointer(), frame.pointer());
    }
}
