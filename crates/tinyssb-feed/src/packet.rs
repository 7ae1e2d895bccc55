//! The 120-byte wire packet and the hash-chain derivations around it.
//!
//! A packet's `dmx` is derived from its *virtual name* (`prefix | fid | seq |
//! prev_mid`), which lets a receiver recognise the next expected packet of a
//! feed without parsing anything. The signature covers the *virtual
//! expanded* record (`name | dmx | type | payload`), and the resulting
//! *message id* folds into the next packet's name, chaining every record to
//! its predecessor.

use tinyssb_codec::{
    constants::{DMX_SIZE, FID_SIZE, MID_SIZE, NAME_PREFIX, PACKET_SIZE, PLAIN_PAYLOAD_SIZE},
    hash::{digest20, digest7},
    signer::{Signature64, Signer, Verifier},
    PacketType,
};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::FeedError;

/// Fixed 120-byte wire packet: `dmx(7) | type(1) | payload(48) | signature(64)`.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct WirePacket {
    dmx: [u8; DMX_SIZE],
    pkt_type: u8,
    payload: [u8; PLAIN_PAYLOAD_SIZE],
    signature: [u8; 64],
}

impl WirePacket {
    /// Size of the serialized packet.
    pub const SIZE: usize = PACKET_SIZE;

    /// Parse a packet from an exactly 120-byte buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FeedError> {
        Self::read_from_bytes(bytes)
            .map_err(|_| FeedError::Truncated { expected: Self::SIZE, actual: bytes.len() })
    }

    /// Serialize to a fixed-size byte array.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PACKET_SIZE] {
        let bytes = IntoBytes::as_bytes(self);
        let mut arr = [0u8; PACKET_SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// The 7-byte DMX tag.
    #[must_use]
    pub fn dmx(&self) -> [u8; DMX_SIZE] {
        self.dmx
    }

    /// The packet's type code, or `None` if unrecognised.
    #[must_use]
    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::from_byte(self.pkt_type)
    }

    /// The raw 48-byte payload slot.
    #[must_use]
    pub fn payload(&self) -> [u8; PLAIN_PAYLOAD_SIZE] {
        self.payload
    }

    /// The 64-byte signature.
    #[must_use]
    pub fn signature(&self) -> Signature64 {
        self.signature
    }

    /// Bytes covered by the signature: the virtual `name | dmx | type |
    /// payload`, not just the wire packet's own fields — a receiver without
    /// `name` (just `fid`, `seq`, `prev_mid`) can still reconstruct it.
    #[must_use]
    fn signed_slice(&self, name: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(name.len() + DMX_SIZE + 1 + PLAIN_PAYLOAD_SIZE);
        out.extend_from_slice(name);
        out.extend_from_slice(&self.dmx);
        out.push(self.pkt_type);
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Derive the virtual name for the packet at `seq` in feed `fid`, chained
/// from the previous record's message id `prev_mid`.
#[must_use]
pub fn virtual_name(fid: &[u8; FID_SIZE], seq: u32, prev_mid: &[u8; MID_SIZE]) -> Vec<u8> {
    let mut name = Vec::with_capacity(NAME_PREFIX.len() + FID_SIZE + 4 + MID_SIZE);
    name.extend_from_slice(NAME_PREFIX);
    name.extend_from_slice(fid);
    name.extend_from_slice(&seq.to_be_bytes());
    name.extend_from_slice(prev_mid);
    name
}

/// Derive the DMX tag for the packet at `seq` in feed `fid`, chained from
/// `prev_mid`.
#[must_use]
pub fn next_packet_dmx(fid: &[u8; FID_SIZE], seq: u32, prev_mid: &[u8; MID_SIZE]) -> [u8; DMX_SIZE] {
    digest7(&[&virtual_name(fid, seq, prev_mid)])
}

/// Derive the want-dmx for `fid`: `SHA-256(fid ∥ "want")[:7]`.
#[must_use]
pub fn want_dmx(fid: &[u8; FID_SIZE]) -> [u8; DMX_SIZE] {
    digest7(&[fid, tinyssb_codec::constants::WANT_SUFFIX])
}

/// Build and sign a new packet at `seq` in feed `fid`, chained from
/// `prev_mid`, carrying `pkt_type` and a payload of at most 48 bytes
/// (zero-padded).
pub fn build_and_sign(
    signer: &dyn Signer,
    fid: &[u8; FID_SIZE],
    seq: u32,
    prev_mid: &[u8; MID_SIZE],
    pkt_type: PacketType,
    payload: &[u8],
) -> Result<WirePacket, FeedError> {
    if payload.len() > PLAIN_PAYLOAD_SIZE {
        return Err(FeedError::Truncated { expected: PLAIN_PAYLOAD_SIZE, actual: payload.len() });
    }
    let name = virtual_name(fid, seq, prev_mid);
    let dmx = digest7(&[&name]);
    let mut padded = [0u8; PLAIN_PAYLOAD_SIZE];
    padded[..payload.len()].copy_from_slice(payload);

    let mut packet = WirePacket { dmx, pkt_type: pkt_type.as_byte(), payload: padded, signature: [0u8; 64] };
    packet.signature = signer.sign(&packet.signed_slice(&name));
    Ok(packet)
}

/// Verify a candidate packet's DMX and signature against the expected
/// chain position, returning the resulting message id on success.
pub fn verify(
    verifier: &dyn Verifier,
    fid: &[u8; FID_SIZE],
    seq: u32,
    prev_mid: &[u8; MID_SIZE],
    packet: &WirePacket,
) -> Result<[u8; MID_SIZE], FeedError> {
    let name = virtual_name(fid, seq, prev_mid);
    let expected_dmx = digest7(&[&name]);
    if packet.dmx() != expected_dmx {
        return Err(FeedError::ChainIncomplete("dmx mismatch".to_string()));
    }
    verifier
        .verify(&packet.signed_slice(&name), &packet.signature())
        .map_err(|_| FeedError::ChainIncomplete("signature mismatch".to_string()))?;
    Ok(message_id(&name, packet))
}

/// Compute the message id of a packet given its virtual name:
/// `SHA-256(name | dmx | type | payload | signature)[:20]`.
#[must_use]
pub fn message_id(name: &[u8], packet: &WirePacket) -> [u8; MID_SIZE] {
    let signed = packet.signed_slice(name);
    digest20(&[&signed, &packet.signature()])
}

impl std::fmt::Debug for WirePacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WirePacket")
            .field("dmx", &hex::encode(self.dmx()))
            .field("type", &self.packet_type())
            .finish_non_exhaustive()
    }
}

impl PartialEq for WirePacket {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for WirePacket {}

#[cfg(test)]
mod tests {
    use tinyssb_codec::signer::{Ed25519Signer, Ed25519Verifier};

    use super::*;

    fn signer_pair() -> (Ed25519Signer, [u8; 32]) {
        let seed = [3u8; 32];
        let signer = Ed25519Signer::from_seed(&seed);
        let fid = signer.verifying_key();
        (signer, fid)
    }

    #[test]
    fn packet_size_is_120() {
        assert_eq!(std::mem::size_of::<WirePacket>(), WirePacket::SIZE);
        assert_eq!(WirePacket::SIZE, 120);
    }

    #[test]
    fn build_verify_round_trip() {
        let (signer, fid) = signer_pair();
        let verifier = Ed25519Verifier::from_public_key(&fid).unwrap();
        let prev_mid = {
            let mut m = [0u8; 20];
            m.copy_from_slice(&fid[..20]);
            m
        };

        let packet =
            build_and_sign(&signer, &fid, 1, &prev_mid, PacketType::Plain48, b"hello").unwrap();
        assert_eq!(&packet.payload()[..5], b"hello");
        assert_eq!(&packet.payload()[5..], &[0u8; 43]);

        let mid = verify(&verifier, &fid, 1, &prev_mid, &packet).expect("verifies");
        assert_eq!(mid.len(), 20);
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let (signer, fid) = signer_pair();
        let verifier = Ed25519Verifier::from_public_key(&fid).unwrap();
        let prev_mid = [0u8; 20];

        let mut packet =
            build_and_sign(&signer, &fid, 1, &prev_mid, PacketType::Plain48, b"hi").unwrap();
        packet.payload[0] ^= 0xFF;

        assert!(verify(&verifier, &fid, 1, &prev_mid, &packet).is_err());
    }

    #[test]
    fn wrong_sequence_fails_dmx_check() {
        let (signer, fid) = signer_pair();
        let verifier = Ed25519Verifier::from_public_key(&fid).unwrap();
        let prev_mid = [0u8; 20];

        let packet =
            build_and_sign(&signer, &fid, 1, &prev_mid, PacketType::Plain48, b"hi").unwrap();

        assert!(verify(&verifier, &fid, 2, &prev_mid, &packet).is_err());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let (signer, fid) = signer_pair();
        let prev_mid = [0u8; 20];
        let too_big = [0u8; 49];
        let err = build_and_sign(&signer, &fid, 1, &prev_mid, PacketType::Plain48, &too_big)
            .unwrap_err();
        assert!(matches!(err, FeedError::Truncated { expected: 48, actual: 49 }));
    }
}
