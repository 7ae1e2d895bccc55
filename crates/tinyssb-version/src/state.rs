//! Persisted version-manager state: which feeds carry which file's
//! history, and where we currently are in it.
//!
//! Serialized to `update_cfg.json` the same way `lockframe-server` persists
//! its own JSON config — hex strings for fids so the file stays readable
//! and diffable, loaded wholesale into memory and written back out after
//! every mutation.

use std::{collections::HashMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use tinyssb_codec::constants::FID_SIZE;

use crate::error::VersionError;

/// One update-feed segment of a file's history: a feed, and the version
/// number its first entry continues from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSegment {
    /// The feed holding this segment's changelists.
    #[serde(with = "fid_hex")]
    pub fid: [u8; FID_SIZE],
    /// Version number this segment's first update continues from.
    pub base_version: u32,
    /// Feed-local sequence number of this segment's last header packet
    /// (`ISCHILD`, `UPDFILE`, `MKCHILD`); update blobs start at
    /// `header_offset + 1`. Always 3: every update-feed segment, whether
    /// freshly created or reached by an emergency rotation, accumulates
    /// exactly those three header packets before its first update.
    pub header_offset: u32,
}

/// One file's tracked history: its update-feed segments and the
/// currently-live emergency feed that can authorize the next rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTrack {
    /// Segments in chronological order; the last one is where new updates
    /// are appended.
    pub segments: Vec<UpdateSegment>,
    /// The emergency feed that can authorize rotating to a new update feed.
    #[serde(with = "fid_hex")]
    pub emergency_fid: [u8; FID_SIZE],
}

impl FileTrack {
    /// The segment new updates are currently appended to.
    #[must_use]
    pub fn current_segment(&self) -> &UpdateSegment {
        self.segments.last().expect("a tracked file always has at least one segment")
    }
}

/// The shared root of every tracked file: a node-wide `update_fid` feed
/// whose child 0 is the `vc_fid` feed (carrying `APPLYUP` packets) and
/// whose further children (1..N) are per-file update feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootFeeds {
    /// The node-wide parent feed every per-file update feed is a child of.
    #[serde(with = "fid_hex")]
    pub update_fid: [u8; FID_SIZE],
    /// Child 0 of `update_fid`: carries `APPLYUP` convergence packets.
    #[serde(with = "fid_hex")]
    pub vc_fid: [u8; FID_SIZE],
}

/// The version manager's full persisted state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionManagerState {
    /// The shared root feeds, created lazily on the first tracked file.
    pub root: Option<RootFeeds>,
    /// Tracked files, by name.
    pub files: HashMap<String, FileTrack>,
    /// The version each file is currently materialized at, by name.
    pub apply_dict: HashMap<String, u32>,
    /// Versions requested (by an `APPLYUP` packet) but not yet applied
    /// because the caller hadn't supplied the content to apply against,
    /// keyed by file name.
    pub apply_queue: HashMap<String, u32>,
}

impl VersionManagerState {
    /// Load state from `path`, or start empty if it doesn't exist yet.
    pub fn load(path: &Path) -> Result<Self, VersionError> {
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Persist state to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), VersionError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

/// Stores a `[u8; 32]` feed id as a hex string in JSON, the way
/// `lockframe-server`'s own config hex-encodes key material.
mod fid_hex {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::FID_SIZE;

    pub fn serialize<S: Serializer>(fid: &[u8; FID_SIZE], serializer: S) -> Result<S::Ok, S::Error> {
        hex::encode(fid).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; FID_SIZE], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if bytes.len() != FID_SIZE {
            return Err(serde::de::Error::custom(format!("expected {FID_SIZE} bytes, got {}", bytes.len())));
        }
        let mut fid = [0u8; FID_SIZE];
        fid.copy_from_slice(&bytes);
        Ok(fid)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_config_loads_empty() {
        let dir = tempdir().unwrap();
        let state = VersionManagerState::load(&dir.path().join("update_cfg.json")).unwrap();
        assert!(state.files.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("update_cfg.json");

        let mut state = VersionManagerState::default();
        state.files.insert(
            "notes.txt".to_string(),
            FileTrack {
                segments: vec![UpdateSegment { fid: [1u8; FID_SIZE], base_version: 0, header_offset: 3 }],
                emergency_fid: [2u8; FID_SIZE],
            },
        );
        state.apply_dict.insert("notes.txt".to_string(), 3);
        state.save(&path).unwrap();

        let loaded = VersionManagerState::load(&path).unwrap();
        assert_eq!(loaded.apply_dict["notes.txt"], 3);
        assert_eq!(loaded.files["notes.txt"].emergency_fid, [2u8; FID_SIZE]);
    }
}
