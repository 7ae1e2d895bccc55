//! The version manager: tracks one update feed (plus a standby emergency
//! feed) per file, and moves a file's materialized content between
//! versions by walking the version graph and applying or reverting
//! changelists along the path.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use tinyssb_codec::{
    constants::FID_SIZE,
    signer::{Ed25519Signer, Signer},
    PacketType,
};
use tinyssb_replicate::FeedManager;

use crate::{
    edit::EditOp,
    error::VersionError,
    graph::{self, VersionGraph},
    state::{FileTrack, RootFeeds, UpdateSegment, VersionManagerState},
};

/// Every freshly-created or rotated-onto update feed accumulates exactly
/// three header packets (`ISCHILD`, `UPDFILE`, `MKCHILD`) before its first
/// update blob.
const HEADER_OFFSET: u32 = 3;

/// Result of [`VersionManager::apply_to`]: either the requested version was
/// reachable and materialized, or its prerequisite hasn't replicated yet
/// and the request was queued instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The target version was reached; here is the resulting content.
    Applied(Vec<u8>),
    /// The target wasn't reachable yet; it's queued in the apply-dict and
    /// will resolve once its prerequisite version shows up.
    Queued,
}

/// Ties a [`FeedManager`] to a persisted [`VersionManagerState`], exposing
/// file-versioning operations on top of raw feed replication.
///
/// Holds `fm` behind an `Arc` (rather than a borrow) so a node can own both
/// its `FeedManager` and `VersionManager` side by side without a
/// self-referential lifetime.
pub struct VersionManager {
    fm: Arc<FeedManager>,
    state: Mutex<VersionManagerState>,
    config_path: PathBuf,
}

impl VersionManager {
    /// Open a version manager backed by `fm`, loading (or starting) its
    /// state from `config_path`.
    pub fn open(fm: Arc<FeedManager>, config_path: impl Into<PathBuf>) -> Result<Self, VersionError> {
        let config_path = config_path.into();
        let state = VersionManagerState::load(&config_path)?;
        Ok(Self { fm, state: Mutex::new(state), config_path })
    }

    fn save(&self) -> Result<(), VersionError> {
        self.state.lock().expect("version state lock poisoned").save(&self.config_path)
    }

    /// The shared root feeds (`update_fid` and its child-0 `vc_fid`),
    /// creating them on first use. Every tracked file's update feed is a
    /// further `MKCHILD` of `update_fid`.
    fn ensure_root(&self) -> Result<RootFeeds, VersionError> {
        {
            let state = self.state.lock().expect("version state lock poisoned");
            if let Some(root) = &state.root {
                return Ok(root.clone());
            }
        }

        let update_fid = self.fm.generate_keypair();
        self.fm.create_feed(update_fid, self.fm.key_for(&update_fid), None)?;

        let vc_fid = self.fm.generate_keypair();
        let vc_seed = self.fm.key_for(&vc_fid).expect("just generated");
        self.fm.create_child_feed(update_fid, vc_fid, vc_seed)?;

        let root = RootFeeds { update_fid, vc_fid };
        let mut state = self.state.lock().expect("version state lock poisoned");
        state.root = Some(root.clone());
        drop(state);
        self.save()?;
        Ok(root)
    }

    /// Begin tracking a new file: creates a per-file update feed as a
    /// `MKCHILD` of the shared root (declaring version 0 via `UPDFILE`)
    /// plus its own standby emergency feed. Returns the pair of fids.
    pub fn create_file(&self, file_name: &str) -> Result<([u8; FID_SIZE], [u8; FID_SIZE]), VersionError> {
        let root = self.ensure_root()?;

        let update_fid = self.fm.generate_keypair();
        let update_seed = self.fm.key_for(&update_fid).expect("just generated");
        self.fm.create_child_feed(root.update_fid, update_fid, update_seed)?;

        let signer = Ed25519Signer::from_seed(&update_seed);
        let payload = graph::encode_updfile_header(0, file_name);
        let mut feed = self.fm.store().open(&update_fid)?;
        feed.append_payload(&signer, PacketType::UpdFile, &payload)?;

        let emergency_fid = self.fm.generate_keypair();
        let emergency_seed = self.fm.key_for(&emergency_fid).expect("just generated");
        self.fm.create_child_feed(update_fid, emergency_fid, emergency_seed)?;

        let mut state = self.state.lock().expect("version state lock poisoned");
        state.files.insert(
            file_name.to_string(),
            FileTrack {
                segments: vec![UpdateSegment { fid: update_fid, base_version: 0, header_offset: HEADER_OFFSET }],
                emergency_fid,
            },
        );
        state.apply_dict.insert(file_name.to_string(), 0);
        drop(state);
        self.save()?;

        Ok((update_fid, emergency_fid))
    }

    /// The version `file_name` is currently materialized at, if tracked.
    #[must_use]
    pub fn current_version(&self, file_name: &str) -> Option<u32> {
        self.state.lock().expect("version state lock poisoned").apply_dict.get(file_name).copied()
    }

    /// Append a changelist to `file_name`'s current update feed, depending
    /// on `depends_on`. Returns the new version number.
    pub fn update_file(
        &self,
        file_name: &str,
        depends_on: u32,
        changes: &[EditOp],
    ) -> Result<u32, VersionError> {
        let segment = {
            let state = self.state.lock().expect("version state lock poisoned");
            let track = state.files.get(file_name).ok_or_else(|| VersionError::UnknownFile(file_name.to_string()))?;
            track.current_segment().clone()
        };

        let seed =
            self.fm.key_for(&segment.fid).ok_or_else(|| VersionError::NoSigningKey(hex::encode(segment.fid)))?;
        let signer = Ed25519Signer::from_seed(&seed);
        let mut feed = self.fm.store().open(&segment.fid)?;
        let step = feed.len() - segment.header_offset + 1;
        let payload = graph::encode_update(depends_on, changes);
        feed.append_blob(&signer, &payload)?;

        let new_version = segment.base_version + step;

        let mut state = self.state.lock().expect("version state lock poisoned");
        if state.apply_dict.get(file_name).copied() == Some(depends_on) {
            state.apply_dict.insert(file_name.to_string(), new_version);
        }
        drop(state);
        self.save()?;

        Ok(new_version)
    }

    /// Rotate `file_name` onto its current emergency feed (which becomes
    /// the new update feed), and provision the next standby emergency
    /// feed as its child. Used after the live update feed's key is
    /// suspected leaked. Returns the new update feed's fid (the previous
    /// emergency feed).
    pub fn emergency_update_file(&self, file_name: &str) -> Result<[u8; FID_SIZE], VersionError> {
        let (new_update_fid, last_version) = {
            let state = self.state.lock().expect("version state lock poisoned");
            let track = state.files.get(file_name).ok_or_else(|| VersionError::UnknownFile(file_name.to_string()))?;
            let last_version = self.latest_version_of(track)?;
            (track.emergency_fid, last_version)
        };

        let update_seed = self
            .fm
            .key_for(&new_update_fid)
            .ok_or_else(|| VersionError::NoSigningKey(hex::encode(new_update_fid)))?;
        let signer = Ed25519Signer::from_seed(&update_seed);
        let payload = graph::encode_updfile_header(last_version, file_name);
        let mut feed = self.fm.store().open(&new_update_fid)?;
        feed.append_payload(&signer, PacketType::UpdFile, &payload)?;

        let new_emergency_fid = self.fm.generate_keypair();
        let new_emergency_seed = self.fm.key_for(&new_emergency_fid).expect("just generated");
        self.fm.create_child_feed(new_update_fid, new_emergency_fid, new_emergency_seed)?;

        let mut state = self.state.lock().expect("version state lock poisoned");
        let track = state.files.get_mut(file_name).expect("checked above");
        track.segments.push(UpdateSegment {
            fid: new_update_fid,
            base_version: last_version,
            header_offset: HEADER_OFFSET,
        });
        track.emergency_fid = new_emergency_fid;
        drop(state);
        self.save()?;

        Ok(new_update_fid)
    }

    fn latest_version_of(&self, track: &FileTrack) -> Result<u32, VersionError> {
        let segment = track.current_segment();
        let feed = self.fm.store().open(&segment.fid)?;
        let step = feed.len().saturating_sub(segment.header_offset);
        Ok(segment.base_version + step)
    }

    /// Move `content` (currently at its apply-dict version) to `target`,
    /// applying or reverting changelists along the version graph's
    /// shortest path. Updates the apply-dict on success.
    ///
    /// A `target` not yet reachable (its prerequisite hasn't replicated
    /// yet) is not an error: it's queued the same way an `APPLYUP` request
    /// would be, via [`Self::register_applyup`], and picked up again once
    /// the missing version shows up.
    pub fn apply_to(&self, file_name: &str, target: u32, content: &[u8]) -> Result<ApplyOutcome, VersionError> {
        let (segments, current) = {
            let state = self.state.lock().expect("version state lock poisoned");
            let track = state.files.get(file_name).ok_or_else(|| VersionError::UnknownFile(file_name.to_string()))?;
            let current = *state.apply_dict.get(file_name).unwrap_or(&0);
            (track.segments.clone(), current)
        };

        let graph = VersionGraph::build(self.fm.store(), &segments)?;
        let Some(path) = graph.shortest_path(current, target) else {
            self.register_applyup(file_name, target);
            return Ok(ApplyOutcome::Queued);
        };

        let mut buf = content.to_vec();
        for window in path.windows(2) {
            let (from, to) = (window[0], window[1]);
            buf = self.step(&graph, from, to, &buf)?;
        }

        let mut state = self.state.lock().expect("version state lock poisoned");
        state.apply_dict.insert(file_name.to_string(), target);
        drop(state);
        self.save()?;

        Ok(ApplyOutcome::Applied(buf))
    }

    /// Apply or revert the single edge between adjacent versions `from` and
    /// `to` on a version-graph path. Versions increase monotonically along
    /// a dependency edge, so `to > from` is always the forward direction
    /// (whether or not `to` happens to have its own location, which every
    /// non-root version does) and `to < from` is always a revert.
    fn step(&self, graph: &VersionGraph, from: u32, to: u32, content: &[u8]) -> Result<Vec<u8>, VersionError> {
        if to > from {
            let location = graph
                .locations
                .get(&to)
                .ok_or_else(|| VersionError::MalformedChangelist(format!("no location for version {to}")))?;
            let feed = self.fm.store().open(&location.fid)?;
            let payload = feed.get_payload(i64::from(location.seq))?;
            let (depends_on, ops) = graph::decode_update(&payload)?;
            debug_assert_eq!(depends_on, from);
            return Ok(crate::edit::apply(content, &ops));
        }
        // Moving backward off of `from`: revert its changelist.
        let location = graph
            .locations
            .get(&from)
            .ok_or_else(|| VersionError::MalformedChangelist(format!("no location for version {from}")))?;
        let feed = self.fm.store().open(&location.fid)?;
        let payload = feed.get_payload(i64::from(location.seq))?;
        let (_depends_on, ops) = graph::decode_update(&payload)?;
        Ok(crate::edit::apply(content, &crate::edit::reverse(&ops)))
    }

    /// Record that a peer's `APPLYUP` packet requested `version` for
    /// `file_name`, deferring the apply until content is supplied via
    /// [`Self::drain_deferred_apply`]. Later requests for the same file
    /// overwrite earlier ones; the queue only ever holds the newest ask.
    pub fn register_applyup(&self, file_name: &str, version: u32) {
        self.state
            .lock()
            .expect("version state lock poisoned")
            .apply_queue
            .insert(file_name.to_string(), version);
    }

    /// If `file_name` has a deferred apply queued, apply it against
    /// `content` and clear the queue entry. Still not reachable (the
    /// prerequisite is itself missing) re-queues it and returns `None`,
    /// same as if nothing had been queued.
    pub fn drain_deferred_apply(&self, file_name: &str, content: &[u8]) -> Result<Option<Vec<u8>>, VersionError> {
        let target = {
            let mut state = self.state.lock().expect("version state lock poisoned");
            state.apply_queue.remove(file_name)
        };
        match target {
            Some(target) => match self.apply_to(file_name, target, content)? {
                ApplyOutcome::Applied(buf) => Ok(Some(buf)),
                ApplyOutcome::Queued => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Append an `APPLYUP` packet to the shared `vc_fid` (child 0 of the
    /// root update feed), requesting that peers apply `file_name` up to
    /// `version`. Payload is `SHA-256(file_name)[:28] | version(4, BE)`.
    pub fn emit_applyup(&self, file_name: &str, version: u32) -> Result<(), VersionError> {
        let vc_fid = self.ensure_root()?.vc_fid;
        let seed = self.fm.key_for(&vc_fid).ok_or_else(|| VersionError::NoSigningKey(hex::encode(vc_fid)))?;
        let signer = Ed25519Signer::from_seed(&seed);

        let digest = tinyssb_codec::hash::digest(&[file_name.as_bytes()]);
        let mut payload = Vec::with_capacity(32 + 4);
        payload.extend_from_slice(&digest[..28]);
        payload.extend_from_slice(&version.to_be_bytes());

        let mut feed = self.fm.store().open(&vc_fid)?;
        feed.append_payload(&signer, PacketType::ApplyUp, &payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::edit::EditOp;

    fn open_manager(dir: &std::path::Path) -> Arc<FeedManager> {
        Arc::new(FeedManager::open(dir.join("_feeds"), dir.join("_blobs")).unwrap())
    }

    fn applied(outcome: ApplyOutcome) -> Vec<u8> {
        match outcome {
            ApplyOutcome::Applied(content) => content,
            ApplyOutcome::Queued => panic!("expected an immediately reachable target"),
        }
    }

    #[test]
    fn create_then_update_then_apply_round_trips() {
        let dir = tempdir().unwrap();
        let fm = open_manager(dir.path());
        let vm = VersionManager::open(Arc::clone(&fm), dir.path().join("update_cfg.json")).unwrap();

        vm.create_file("notes.txt").unwrap();
        assert_eq!(vm.current_version("notes.txt"), Some(0));

        let ops = vec![EditOp::Insert { at: 0, bytes: b"hello".to_vec() }];
        let v1 = vm.update_file("notes.txt", 0, &ops).unwrap();
        assert_eq!(v1, 1);
        // Appending our own update auto-advances the apply-dict: we are the
        // author, so we already have the resulting content.
        assert_eq!(vm.current_version("notes.txt"), Some(1));

        // Revert to the empty root version, then re-apply forward: each
        // leg is a genuine single-hop step, not a same-version no-op.
        let content = applied(vm.apply_to("notes.txt", 0, b"hello").unwrap());
        assert_eq!(content, b"");

        let content = applied(vm.apply_to("notes.txt", 1, &content).unwrap());
        assert_eq!(content, b"hello");
    }

    #[test]
    fn emergency_rotation_continues_the_version_sequence() {
        let dir = tempdir().unwrap();
        let fm = open_manager(dir.path());
        let vm = VersionManager::open(Arc::clone(&fm), dir.path().join("update_cfg.json")).unwrap();

        vm.create_file("notes.txt").unwrap();
        vm.update_file("notes.txt", 0, &[EditOp::Insert { at: 0, bytes: b"hi".to_vec() }]).unwrap();

        vm.emergency_update_file("notes.txt").unwrap();

        let v2 = vm.update_file("notes.txt", 1, &[EditOp::Insert { at: 2, bytes: b"!".to_vec() }]).unwrap();
        assert_eq!(v2, 2);
        assert_eq!(vm.current_version("notes.txt"), Some(2));

        // Revert all the way down, then re-apply forward across the
        // emergency-rotation segment boundary (0 -> 1 is the original
        // update feed, 1 -> 2 is the rotated-onto one).
        let content = applied(vm.apply_to("notes.txt", 0, b"hi!").unwrap());
        assert_eq!(content, b"");

        let content = applied(vm.apply_to("notes.txt", 2, &content).unwrap());
        assert_eq!(content, b"hi!");
    }

    #[test]
    fn branch_reconcile_reverts_then_applies_across_a_multi_hop_path() {
        let dir = tempdir().unwrap();
        let fm = open_manager(dir.path());
        let vm = VersionManager::open(Arc::clone(&fm), dir.path().join("update_cfg.json")).unwrap();

        vm.create_file("notes.txt").unwrap();
        vm.update_file("notes.txt", 0, &[EditOp::Insert { at: 0, bytes: b"a".to_vec() }]).unwrap();
        // Version 2: depends on 1, inserts "b". Auto-advances the apply-dict
        // to 2, landing us at "ab" without an explicit apply_to.
        vm.update_file("notes.txt", 1, &[EditOp::Insert { at: 1, bytes: b"b".to_vec() }]).unwrap();
        // A second branch also depending on 1, landing at version 3 instead
        // of 2 once applied — the apply-dict stays at 2 since this update's
        // dependency no longer matches it.
        vm.update_file("notes.txt", 1, &[EditOp::Insert { at: 1, bytes: b"c".to_vec() }]).unwrap();
        assert_eq!(vm.current_version("notes.txt"), Some(2));

        // Path from 2 to 3 runs through 1: revert version 2's insert, then
        // apply version 3's — a direction the old location-presence check
        // got backward on every edge but the one touching version 0.
        let content = applied(vm.apply_to("notes.txt", 3, b"ab").unwrap());
        assert_eq!(content, b"ac");
    }

    #[test]
    fn unreachable_target_queues_instead_of_erroring() {
        let dir = tempdir().unwrap();
        let fm = open_manager(dir.path());
        let vm = VersionManager::open(Arc::clone(&fm), dir.path().join("update_cfg.json")).unwrap();

        vm.create_file("notes.txt").unwrap();

        // Version 5 hasn't replicated at all: no path exists yet, but
        // apply_to must queue the request rather than returning an error.
        let outcome = vm.apply_to("notes.txt", 5, b"").unwrap();
        assert_eq!(outcome, ApplyOutcome::Queued);

        // The request is now indistinguishable from one registered via an
        // incoming APPLYUP packet: it drains once satisfiable.
        vm.update_file("notes.txt", 0, &[EditOp::Insert { at: 0, bytes: b"hi".to_vec() }]).unwrap();
        assert_eq!(vm.drain_deferred_apply("notes.txt", b"").unwrap(), None, "version 5 still unreachable");

        let queued = vm.state.lock().expect("version state lock poisoned").apply_queue.get("notes.txt").copied();
        assert_eq!(queued, Some(5));
    }

    #[test]
    fn deferred_apply_runs_once_content_is_supplied() {
        let dir = tempdir().unwrap();
        let fm = open_manager(dir.path());
        let vm = VersionManager::open(Arc::clone(&fm), dir.path().join("update_cfg.json")).unwrap();

        vm.create_file("notes.txt").unwrap();
        vm.update_file("notes.txt", 0, &[EditOp::Insert { at: 0, bytes: b"hi".to_vec() }]).unwrap();
        // update_file's auto-advance already put us at version 1; revert to
        // the root first so the deferred apply below is a genuine 0 -> 1
        // walk rather than a same-version no-op.
        let reverted = applied(vm.apply_to("notes.txt", 0, b"hi").unwrap());
        assert_eq!(reverted, b"");

        vm.register_applyup("notes.txt", 1);
        let result = vm.drain_deferred_apply("notes.txt", &reverted).unwrap();
        assert_eq!(result, Some(b"hi".to_vec()));
        assert_eq!(vm.drain_deferred_apply("notes.txt", b"").unwrap(), None);
    }
}
