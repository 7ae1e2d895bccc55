//! Node-level error types.

use thiserror::Error;

/// Errors that can occur while initialising or running a node.
#[derive(Error, Debug)]
pub enum NodeError {
    /// Underlying feed storage error.
    #[error(transparent)]
    Feed(#[from] tinyssb_feed::FeedError),

    /// Underlying replication error.
    #[error(transparent)]
    Replicate(#[from] tinyssb_replicate::ReplicateError),

    /// Underlying version-manager error.
    #[error(transparent)]
    Version(#[from] tinyssb_version::VersionError),

    /// Underlying I/O loop error.
    #[error(transparent)]
    Io(#[from] tinyssb_io::IoError),

    /// `base_dir` does not exist and `init` was not run first.
    #[error("node not initialised at {0}: run `init` first")]
    NotInitialised(String),

    /// Underlying file-system error.
    #[error("I/O error: {0}")]
    Fs(String),

    /// Underlying JSON (de)serialization error.
    #[error("config error: {0}")]
    Serde(String),

    /// A bind or broadcast address failed to parse.
    #[error("invalid address '{0}': {1}")]
    InvalidAddress(String, String),

    /// `run --http` was requested; the HTTP status surface is a documented
    /// no-op.
    #[error("the --http status surface is not implemented")]
    HttpNotImplemented,
}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::Fs(err.to_string())
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::Serde(err.to_string())
    }
}
