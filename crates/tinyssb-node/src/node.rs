//! Wires a [`FeedManager`], [`VersionManager`], and [`IoLoop`] together into
//! a runnable node.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tinyssb_io::{IoLoop, UdpTransport};
use tinyssb_replicate::FeedManager;
use tinyssb_version::VersionManager;

use crate::{
    config::{NodeConfig, CONFIG_FILE_NAME},
    error::NodeError,
};

const FEEDS_DIR: &str = "_feeds";
const BLOBS_DIR: &str = "_blobs";
const UPDATE_CONFIG_FILE_NAME: &str = "update_cfg.json";

/// A tinyssb node rooted at a base directory: its feed store, version
/// manager, and (once [`Self::run`] is called) its I/O loop.
pub struct Node {
    base_dir: PathBuf,
    config: NodeConfig,
    feed_manager: Arc<FeedManager>,
    version_manager: VersionManager,
}

impl Node {
    /// Initialise a fresh node at `base_dir`: creates the directory
    /// structure and a default `node_cfg.json` if one doesn't already
    /// exist. Idempotent.
    pub fn init(base_dir: impl AsRef<Path>) -> Result<(), NodeError> {
        let base_dir = base_dir.as_ref();
        std::fs::create_dir_all(base_dir.join(FEEDS_DIR))?;
        std::fs::create_dir_all(base_dir.join(BLOBS_DIR))?;
        let config = NodeConfig::load(base_dir)?;
        config.save(base_dir)?;
        tracing::info!(base_dir = %base_dir.display(), "node initialised");
        Ok(())
    }

    /// Remove all feed, blob, and config state under `base_dir`, leaving
    /// the directory itself in place.
    pub fn clean(base_dir: impl AsRef<Path>) -> Result<(), NodeError> {
        let base_dir = base_dir.as_ref();
        for entry in [FEEDS_DIR, BLOBS_DIR, CONFIG_FILE_NAME, UPDATE_CONFIG_FILE_NAME] {
            let path = base_dir.join(entry);
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else if path.is_file() {
                std::fs::remove_file(&path)?;
            }
        }
        tracing::info!(base_dir = %base_dir.display(), "node state cleaned");
        Ok(())
    }

    /// Open a node rooted at `base_dir`, which must already have been
    /// [`Self::init`]ialised.
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self, NodeError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        if !base_dir.join(FEEDS_DIR).is_dir() {
            return Err(NodeError::NotInitialised(base_dir.display().to_string()));
        }

        let config = NodeConfig::load(&base_dir)?;
        let feed_manager =
            Arc::new(FeedManager::open(base_dir.join(FEEDS_DIR), base_dir.join(BLOBS_DIR))?);
        let version_manager =
            VersionManager::open(Arc::clone(&feed_manager), base_dir.join(UPDATE_CONFIG_FILE_NAME))?;

        Ok(Self { base_dir, config, feed_manager, version_manager })
    }

    /// The underlying feed manager.
    #[must_use]
    pub fn feed_manager(&self) -> &Arc<FeedManager> {
        &self.feed_manager
    }

    /// The underlying version manager.
    #[must_use]
    pub fn version_manager(&self) -> &VersionManager {
        &self.version_manager
    }

    /// Start the node's UDP transport and RX/TX/want-fill loop, blocking
    /// until `shutdown` is signalled externally (e.g. Ctrl-C in `main`).
    /// Returns the running [`IoLoop`] handle so the caller controls when to
    /// stop it.
    pub fn spawn_io_loop(&self) -> Result<IoLoop, NodeError> {
        let bind_addr: SocketAddr = self
            .config
            .bind_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| NodeError::InvalidAddress(self.config.bind_addr.clone(), e.to_string()))?;
        let broadcast_addr: SocketAddr = self
            .config
            .broadcast_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                NodeError::InvalidAddress(self.config.broadcast_addr.clone(), e.to_string())
            })?;

        let transport = Arc::new(UdpTransport::bind(bind_addr, broadcast_addr)?);
        let want_interval = Duration::from_millis(self.config.want_interval_ms);
        tracing::info!(
            base_dir = %self.base_dir.display(),
            bind = %bind_addr,
            broadcast = %broadcast_addr,
            "node I/O loop starting"
        );
        Ok(IoLoop::spawn(transport, Arc::clone(&self.feed_manager), want_interval))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn open_without_init_fails() {
        let dir = tempdir().unwrap();
        assert!(matches!(Node::open(dir.path()), Err(NodeError::NotInitialised(_))));
    }

    #[test]
    fn init_then_open_succeeds_and_tracks_files() {
        let dir = tempdir().unwrap();
        Node::init(dir.path()).unwrap();
        let node = Node::open(dir.path()).unwrap();

        node.version_manager().create_file("notes.txt").unwrap();
        assert_eq!(node.version_manager().current_version("notes.txt"), Some(0));
    }

    #[test]
    fn clean_removes_state_but_not_the_directory() {
        let dir = tempdir().unwrap();
        Node::init(dir.path()).unwrap();
        Node::clean(dir.path()).unwrap();

        assert!(dir.path().exists());
        assert!(!dir.path().join("_feeds").exists());
    }
}
