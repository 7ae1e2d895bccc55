//! Little-endian VarInt codec.
//!
//! Mirrors `ussb`'s `util.to_var_int` / `util.from_var_int`: a one-byte
//! header encodes values up to 252 directly; values that don't fit use a
//! sentinel header byte (`0xFD`, `0xFE`, `0xFF`) followed by a fixed-width
//! little-endian payload of 2, 4, or 8 bytes respectively.

use thiserror::Error;

/// Errors returned while decoding a VarInt.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VarIntError {
    /// The buffer ended before the header's payload was fully read.
    #[error("truncated varint: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required to complete the payload.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },
    /// The buffer was empty.
    #[error("empty buffer")]
    Empty,
}

const U16_HEADER: u8 = 0xFD;
const U32_HEADER: u8 = 0xFE;
const U64_HEADER: u8 = 0xFF;

/// Encode `value` as a VarInt, returning 1, 3, 5, or 9 bytes.
#[must_use]
pub fn encode(value: u64) -> Vec<u8> {
    if value < u64::from(U16_HEADER) {
        vec![value as u8]
    } else if value <= u64::from(u16::MAX) {
        let mut out = Vec::with_capacity(3);
        out.push(U16_HEADER);
        out.extend_from_slice(&(value as u16).to_le_bytes());
        out
    } else if value <= u64::from(u32::MAX) {
        let mut out = Vec::with_capacity(5);
        out.push(U32_HEADER);
        out.extend_from_slice(&(value as u32).to_le_bytes());
        out
    } else {
        let mut out = Vec::with_capacity(9);
        out.push(U64_HEADER);
        out.extend_from_slice(&value.to_le_bytes());
        out
    }
}

/// Decode a VarInt from the start of `buf`, returning the value and the
/// number of bytes consumed.
pub fn decode(buf: &[u8]) -> Result<(u64, usize), VarIntError> {
    let header = *buf.first().ok_or(VarIntError::Empty)?;
    match header {
        U16_HEADER => {
            let payload = buf.get(1..3).ok_or(VarIntError::Truncated {
                needed: 3,
                available: buf.len(),
            })?;
            let mut bytes = [0u8; 2];
            bytes.copy_from_slice(payload);
            Ok((u64::from(u16::from_le_bytes(bytes)), 3))
        },
        U32_HEADER => {
            let payload = buf.get(1..5).ok_or(VarIntError::Truncated {
                needed: 5,
                available: buf.len(),
            })?;
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(payload);
            Ok((u64::from(u32::from_le_bytes(bytes)), 5))
        },
        U64_HEADER => {
            let payload = buf.get(1..9).ok_or(VarIntError::Truncated {
                needed: 9,
                available: buf.len(),
            })?;
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(payload);
            Ok((u64::from_le_bytes(bytes), 9))
        },
        small => Ok((u64::from(small), 1)),
    }
}
