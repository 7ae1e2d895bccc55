//! Extracting the version DAG for a file from its update-feed segments, and
//! finding a path between two versions in it.
//!
//! A file's history is a chain of update-feed *segments*: the feed a
//! version's changelist lives in, plus the version number its first entry
//! continues from (`base_version`). Within a segment, version numbers are
//! consecutive (`base_version + 1`, `base_version + 2`, ...), each one's
//! changelist stored at `header_offset + step`. Across an emergency
//! rotation the new segment's `base_version` equals whatever version the
//! old segment last reached, so the graph is connected even though the
//! changelists themselves live in different feeds.

use std::collections::{HashMap, VecDeque};

use tinyssb_feed::FeedStore;

use crate::{edit, error::VersionError, state::UpdateSegment};

/// Where a version's changelist lives, and what it depends on.
#[derive(Debug, Clone, Copy)]
pub struct VersionLocation {
    /// The feed holding this version's changelist.
    pub fid: [u8; 32],
    /// The feed-local sequence number of the changelist packet.
    pub seq: u32,
}

/// The version graph for one file: every version reachable from its
/// update-feed segments, with an undirected edge to the version each one
/// depends on.
pub struct VersionGraph {
    /// Where each version's changelist is stored.
    pub locations: HashMap<u32, VersionLocation>,
    edges: HashMap<u32, Vec<u32>>,
}

impl VersionGraph {
    /// Walk every segment's update packets, recording each version's
    /// location and its edge to the version it depends on.
    pub fn build(store: &FeedStore, segments: &[UpdateSegment]) -> Result<Self, VersionError> {
        let mut locations = HashMap::new();
        let mut edges: HashMap<u32, Vec<u32>> = HashMap::new();

        for segment in segments {
            let feed = store.open(&segment.fid)?;
            let update_count = feed.len().saturating_sub(segment.header_offset);
            for step in 1..=update_count {
                let seq = segment.header_offset + step;
                let version = segment.base_version + step;
                let payload = feed.get_payload(i64::from(seq))?;
                let (depends_on, _ops) = decode_update(&payload)?;

                locations.insert(version, VersionLocation { fid: segment.fid, seq });
                edges.entry(version).or_default().push(depends_on);
                edges.entry(depends_on).or_default().push(version);
            }
        }

        Ok(Self { locations, edges })
    }

    /// Shortest path from `from` to `to`, inclusive of both endpoints, or
    /// `None` if they are not connected (or `from == to`, trivially `[from]`).
    #[must_use]
    pub fn shortest_path(&self, from: u32, to: u32) -> Option<Vec<u32>> {
        if from == to {
            return Some(vec![from]);
        }
        let mut visited = HashMap::new();
        visited.insert(from, from);
        let mut queue = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            let Some(neighbours) = self.edges.get(&current) else { continue };
            for &next in neighbours {
                if visited.contains_key(&next) {
                    continue;
                }
                visited.insert(next, current);
                if next == to {
                    return Some(reconstruct(&visited, from, to));
                }
                queue.push_back(next);
            }
        }
        None
    }
}

fn reconstruct(visited: &HashMap<u32, u32>, from: u32, to: u32) -> Vec<u32> {
    let mut path = vec![to];
    let mut current = to;
    while current != from {
        current = visited[&current];
        path.push(current);
    }
    path.reverse();
    path
}

/// Decode an update packet's payload: `depends_on(4, BE) | changelist`.
pub(crate) fn decode_update(payload: &[u8]) -> Result<(u32, Vec<edit::EditOp>), VersionError> {
    if payload.len() < 4 {
        return Err(VersionError::MalformedChangelist("update blob too short".to_string()));
    }
    let mut depends_on = [0u8; 4];
    depends_on.copy_from_slice(&payload[..4]);
    let depends_on = u32::from_be_bytes(depends_on);
    let ops = edit::decode(&payload[4..])?;
    Ok((depends_on, ops))
}

/// Encode an update packet's payload from a dependency version and a
/// changelist.
#[must_use]
pub(crate) fn encode_update(depends_on: u32, ops: &[edit::EditOp]) -> Vec<u8> {
    let mut out = depends_on.to_be_bytes().to_vec();
    out.extend_from_slice(&edit::encode(ops));
    out
}

/// Decode an `UPDFILE` header packet's payload: `base_version(4, BE) |
/// file_name`.
pub(crate) fn decode_updfile_header(payload: &[u8]) -> Result<(u32, String), VersionError> {
    if payload.len() < 4 {
        return Err(VersionError::MalformedChangelist("UPDFILE header too short".to_string()));
    }
    let mut base = [0u8; 4];
    base.copy_from_slice(&payload[..4]);
    let base_version = u32::from_be_bytes(base);
    let file_name = String::from_utf8_lossy(&payload[4..]).into_owned();
    Ok((base_version, file_name))
}

/// Encode an `UPDFILE` header packet's payload.
#[must_use]
pub(crate) fn encode_updfile_header(base_version: u32, file_name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + file_name.len());
    out.extend_from_slice(&base_version.to_be_bytes());
    out.extend_from_slice(file_name.as_bytes());
    out
}
