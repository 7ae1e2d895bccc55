//! Parsing of "want" request frames: 43 bytes for the next packet, 63 bytes
//! for a specific blob frame, both prefixed with the want-dmx tag (the tag
//! itself has already been consumed by the DMX lookup that routed the
//! request here).

use tinyssb_codec::constants::{
    DMX_SIZE, FID_SIZE, MID_SIZE, WANT_BLOB_REQUEST_SIZE, WANT_PACKET_REQUEST_SIZE,
};

use crate::error::ReplicateError;

/// A parsed want request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedWant {
    /// The feed being asked about.
    pub fid: [u8; FID_SIZE],
    /// Sequence number context (next expected packet, or the chain head's
    /// current front seq for a blob request).
    pub seq: u32,
    /// The specific blob pointer being requested, if this is a blob want.
    pub ptr: Option<[u8; MID_SIZE]>,
}

/// Parse a full want frame (including its leading 7-byte want-dmx).
pub fn parse(frame: &[u8]) -> Result<ParsedWant, ReplicateError> {
    match frame.len() {
        WANT_PACKET_REQUEST_SIZE => {
            let fid = read_fid(frame)?;
            let seq = read_seq(frame)?;
            Ok(ParsedWant { fid, seq, ptr: None })
        },
        WANT_BLOB_REQUEST_SIZE => {
            let fid = read_fid(frame)?;
            let seq = read_seq(frame)?;
            let mut ptr = [0u8; MID_SIZE];
            ptr.copy_from_slice(&frame[DMX_SIZE + FID_SIZE + 4..]);
            Ok(ParsedWant { fid, seq, ptr: Some(ptr) })
        },
        other => Err(ReplicateError::MalformedFrame(format!("unexpected want length {other}"))),
    }
}

fn read_fid(frame: &[u8]) -> Result<[u8; FID_SIZE], ReplicateError> {
    let mut fid = [0u8; FID_SIZE];
    fid.copy_from_slice(&frame[DMX_SIZE..DMX_SIZE + FID_SIZE]);
    Ok(fid)
}

fn read_seq(frame: &[u8]) -> Result<u32, ReplicateError> {
    let start = DMX_SIZE + FID_SIZE;
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&frame[start..start + 4]);
    Ok(u32::from_be_bytes(bytes))
}

/// Build a "want next packet" request frame: `want_dmx(7) | fid(32) | seq(4)`.
#[must_use]
pub fn build_packet_want(want_dmx: [u8; DMX_SIZE], fid: [u8; FID_SIZE], seq: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(WANT_PACKET_REQUEST_SIZE);
    out.extend_from_slice(&want_dmx);
    out.extend_from_slice(&fid);
    out.extend_from_slice(&seq.to_be_bytes());
    out
}

/// Build a "want blob" request frame: `want_dmx(7) | fid(32) | seq(4) | ptr(20)`.
#[must_use]
pub fn build_blob_want(
    want_dmx: [u8; DMX_SIZE],
    fid: [u8; FID_SIZE],
    seq: u32,
    ptr: [u8; MID_SIZE],
) -> Vec<u8> {
    let mut out = build_packet_want(want_dmx, fid, seq);
    out.extend_from_slice(&ptr);
    out
}
