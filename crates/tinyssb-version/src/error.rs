//! Version-manager error types.

use thiserror::Error;

/// Errors that can occur while tracking or applying file versions.
#[derive(Error, Debug)]
pub enum VersionError {
    /// No file is tracked under this name.
    #[error("unknown file: {0}")]
    UnknownFile(String),

    /// An edit-operation changelist was malformed.
    #[error("malformed changelist: {0}")]
    MalformedChangelist(String),

    /// An operation that requires producing into a feed was attempted
    /// without holding that feed's private key.
    #[error("no signing key for feed {0}")]
    NoSigningKey(String),

    /// Underlying feed storage error.
    #[error(transparent)]
    Feed(#[from] tinyssb_feed::FeedError),

    /// Underlying replication error.
    #[error(transparent)]
    Replicate(#[from] tinyssb_replicate::ReplicateError),

    /// VarInt decode error inside a changelist or `UPDFILE` payload.
    #[error(transparent)]
    VarInt(#[from] tinyssb_codec::varint::VarIntError),

    /// Underlying I/O error while loading or saving config.
    #[error("I/O error: {0}")]
    Io(String),

    /// Underlying JSON (de)serialization error while loading or saving
    /// config.
    #[error("config error: {0}")]
    Serde(String),
}

impl From<std::io::Error> for VersionError {
    fn from(err: std::io::Error) -> Self {
        VersionError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VersionError {
    fn from(err: serde_json::Error) -> Self {
        VersionError::Serde(err.to_string())
    }
}
