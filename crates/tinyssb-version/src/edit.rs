//! The edit-operation changelist: a compact insert/delete diff format
//! applied against a file's content to move it forward (or, reversed,
//! backward) one version.
//!
//! Each operation carries the bytes it inserts or deletes so that applying
//! it is a pure function of the changelist and the content it targets, and
//! reversing it is just a matter of swapping insert/delete and replaying in
//! reverse order — no external context needed.

use tinyssb_codec::varint;

use crate::error::VersionError;

/// A single insert or delete, anchored at a byte offset into the content
/// being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    /// Insert `bytes` at offset `at`.
    Insert {
        /// Byte offset the insertion starts at.
        at: u64,
        /// Bytes inserted.
        bytes: Vec<u8>,
    },
    /// Delete `bytes` starting at offset `at` (included so the op can be
    /// reversed into an `Insert` without re-reading the original content).
    Delete {
        /// Byte offset the deletion starts at.
        at: u64,
        /// Bytes removed.
        bytes: Vec<u8>,
    },
}

const OP_INSERT: u8 = b'I';
const OP_DELETE: u8 = b'D';

/// Encode a changelist: `(VarInt(record_len) | VarInt(at) | op_byte | bytes)*`,
/// where `record_len` covers everything from the inner `VarInt(at)` onward.
#[must_use]
pub fn encode(ops: &[EditOp]) -> Vec<u8> {
    let mut out = Vec::new();
    for op in ops {
        let (op_byte, at, bytes) = match op {
            EditOp::Insert { at, bytes } => (OP_INSERT, *at, bytes),
            EditOp::Delete { at, bytes } => (OP_DELETE, *at, bytes),
        };
        let mut record = varint::encode(at);
        record.push(op_byte);
        record.extend_from_slice(bytes);
        out.extend_from_slice(&varint::encode(record.len() as u64));
        out.extend_from_slice(&record);
    }
    out
}

/// Decode a changelist produced by [`encode`].
pub fn decode(buf: &[u8]) -> Result<Vec<EditOp>, VersionError> {
    let mut ops = Vec::new();
    let mut pos = 0;
    while pos < buf.len() {
        let (record_len, used) = varint::decode(&buf[pos..])?;
        pos += used;
        let record_len = record_len as usize;
        let record = buf
            .get(pos..pos + record_len)
            .ok_or_else(|| VersionError::MalformedChangelist("truncated op record".to_string()))?;
        pos += record_len;

        let (at, used) = varint::decode(record)?;
        let op_byte = *record
            .get(used)
            .ok_or_else(|| VersionError::MalformedChangelist("missing op byte".to_string()))?;
        let bytes = record[used + 1..].to_vec();
        ops.push(match op_byte {
            OP_INSERT => EditOp::Insert { at, bytes },
            OP_DELETE => EditOp::Delete { at, bytes },
            other => {
                return Err(VersionError::MalformedChangelist(format!("unknown op byte {other:#x}")))
            },
        });
    }
    Ok(ops)
}

/// Apply a changelist to `content`, moving it forward one version.
///
/// Deletes run first, in decreasing order of `at` (so an earlier deletion
/// never invalidates the offset of one still pending); inserts then run in
/// their given order against the result. This ordering is what keeps a
/// changelist's offsets valid without renumbering them after each op.
#[must_use]
pub fn apply(content: &[u8], ops: &[EditOp]) -> Vec<u8> {
    let mut buf = content.to_vec();

    let mut deletes: Vec<(u64, &[u8])> = ops
        .iter()
        .filter_map(|op| match op {
            EditOp::Delete { at, bytes } => Some((*at, bytes.as_slice())),
            EditOp::Insert { .. } => None,
        })
        .collect();
    deletes.sort_by(|a, b| b.0.cmp(&a.0));
    for (at, bytes) in deletes {
        let at = at as usize;
        let end = (at + bytes.len()).min(buf.len());
        if at < end {
            buf.splice(at..end, std::iter::empty());
        }
    }

    for op in ops {
        if let EditOp::Insert { at, bytes } = op {
            let at = (*at as usize).min(buf.len());
            buf.splice(at..at, bytes.iter().copied());
        }
    }

    buf
}

/// Invert a changelist (swap insert/delete on each op, reverse order) so
/// that applying it undoes the original, moving content back one version.
#[must_use]
pub fn reverse(ops: &[EditOp]) -> Vec<EditOp> {
    ops.iter()
        .rev()
        .map(|op| match op {
            EditOp::Insert { at, bytes } => EditOp::Delete { at: *at, bytes: bytes.clone() },
            EditOp::Delete { at, bytes } => EditOp::Insert { at: *at, bytes: bytes.clone() },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn insert_then_delete_round_trips_content() {
        let content = b"hello world".to_vec();
        let ops = vec![EditOp::Insert { at: 5, bytes: b" cruel".to_vec() }];
        let forward = apply(&content, &ops);
        assert_eq!(forward, b"hello cruel world");

        let back = apply(&forward, &reverse(&ops));
        assert_eq!(back, content);
    }

    #[test]
    fn encode_decode_round_trips() {
        let ops =
            vec![EditOp::Insert { at: 0, bytes: b"abc".to_vec() }, EditOp::Delete { at: 10, bytes: b"xy".to_vec() }];
        let encoded = encode(&ops);
        assert_eq!(decode(&encoded).unwrap(), ops);
    }

    #[test]
    fn truncated_changelist_is_rejected() {
        let ops = vec![EditOp::Insert { at: 0, bytes: b"abc".to_vec() }];
        let mut encoded = encode(&ops);
        encoded.truncate(encoded.len() - 1);
        assert!(decode(&encoded).is_err());
    }

    proptest! {
        #[test]
        fn any_changelist_round_trips(
            ops in proptest::collection::vec(
                (any::<bool>(), 0u64..100, proptest::collection::vec(any::<u8>(), 0..16)),
                0..8,
            )
        ) {
            let ops: Vec<EditOp> = ops
                .into_iter()
                .map(|(is_delete, at, bytes)| if is_delete {
                    EditOp::Delete { at, bytes }
                } else {
                    EditOp::Insert { at, bytes }
                })
                .collect();
            let encoded = encode(&ops);
            prop_assert_eq!(decode(&encoded).unwrap(), ops);
        }
    }
}
