//! Node-level configuration, persisted to `node_cfg.json` under the node's
//! base directory.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::NodeError;

/// Name of the node config file under a node's base directory.
pub const CONFIG_FILE_NAME: &str = "node_cfg.json";

/// Node-level settings: where to listen and broadcast, and how often to
/// retransmit wants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Local UDP address the node's transport binds to.
    pub bind_addr: String,
    /// Broadcast address datagrams are sent to.
    pub broadcast_addr: String,
    /// Milliseconds between want-fill broadcast ticks.
    pub want_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7007".to_string(),
            broadcast_addr: "255.255.255.255:7007".to_string(),
            want_interval_ms: 2_000,
        }
    }
}

impl NodeConfig {
    /// Load config from `base_dir`, or the default if it doesn't exist yet.
    pub fn load(base_dir: &Path) -> Result<Self, NodeError> {
        let path = base_dir.join(CONFIG_FILE_NAME);
        match fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Persist config to `base_dir`, creating it if needed.
    pub fn save(&self, base_dir: &Path) -> Result<(), NodeError> {
        fs::create_dir_all(base_dir)?;
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(base_dir.join(CONFIG_FILE_NAME), bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_config_loads_defaults() {
        let dir = tempdir().unwrap();
        let cfg = NodeConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.want_interval_ms, 2_000);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let mut cfg = NodeConfig::default();
        cfg.want_interval_ms = 500;
        cfg.save(dir.path()).unwrap();

        let loaded = NodeConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.want_interval_ms, 500);
    }
}
